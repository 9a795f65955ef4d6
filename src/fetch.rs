//! Pre-generated region sources and the asynchronous fetcher.
//!
//! A [`RegionSource`] returns the baked chunk records of one region (from a directory or
//! over HTTP). [`RegionFetcher`] runs those fetches on a tokio runtime so the frame loop
//! never blocks; finished regions are drained once per frame with [`RegionFetcher::poll`].
//! Re-requesting a region supersedes the earlier request: only the newest result is kept.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::chunk::{Chunk, ChunkError, ChunkRecord, RegionCoord};
use crate::config::WorldConfig;
use crate::export::{Manifest, MANIFEST_FILE};

/// HTTP request timeout for region downloads
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read region file: {0}")]
    Io(#[from] std::io::Error),
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to parse region data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed chunk: {0}")]
    Chunk(#[from] ChunkError),
    #[error("chunk ({cx}, {cy}) does not belong to {region}")]
    Misplaced { cx: i32, cy: i32, region: RegionCoord },
    #[error("chunk ({cx}, {cy}) appears more than once in {region}")]
    Duplicate { cx: i32, cy: i32, region: RegionCoord },
    #[error("{region} holds {found} of its {expected} chunks")]
    Incomplete { region: RegionCoord, expected: usize, found: usize },
    #[error("baked regions were made for a different world: {what} is {found}, expected {expected}")]
    Mismatch { what: &'static str, expected: String, found: String },
    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Somewhere pre-generated regions can be loaded from.
pub trait RegionSource: Send + Sync {
    /// Blocking fetch of one region's chunk records.
    fn fetch(&self, region: RegionCoord) -> Result<Vec<ChunkRecord>, FetchError>;

    /// The manifest written next to the baked regions.
    fn manifest(&self) -> Result<Manifest, FetchError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Baked regions in a local directory (`region_{rx}_{ry}.json`).
pub struct DirRegionSource {
    dir: PathBuf,
}

impl DirRegionSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, region: RegionCoord) -> PathBuf {
        self.dir.join(region.file_name())
    }
}

impl DirRegionSource {
    fn read_json<T: DeserializeOwned>(&self, path: PathBuf) -> Result<T, FetchError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl RegionSource for DirRegionSource {
    fn fetch(&self, region: RegionCoord) -> Result<Vec<ChunkRecord>, FetchError> {
        self.read_json(self.path_for(region))
    }

    fn manifest(&self) -> Result<Manifest, FetchError> {
        self.read_json(self.dir.join(MANIFEST_FILE))
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Baked regions served over HTTP at `{base_url}/region_{rx}_{ry}.json`.
pub struct HttpRegionSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRegionSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url_for(&self, region: RegionCoord) -> String {
        format!("{}/{}", self.base_url, region.file_name())
    }

    fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, FetchError> {
        let response = self.client.get(&url).send()?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json()?)
    }
}

impl RegionSource for HttpRegionSource {
    fn fetch(&self, region: RegionCoord) -> Result<Vec<ChunkRecord>, FetchError> {
        self.get_json(self.url_for(region))
    }

    fn manifest(&self) -> Result<Manifest, FetchError> {
        self.get_json(format!("{}/{}", self.base_url, MANIFEST_FILE))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Check that baked regions were produced by the same world as `config`.
pub fn check_manifest(manifest: &Manifest, config: &WorldConfig) -> Result<(), FetchError> {
    let mismatch = |what, expected: String, found: String| {
        if expected == found {
            Ok(())
        } else {
            Err(FetchError::Mismatch { what, expected, found })
        }
    };

    mismatch("seed", config.seed.text().to_string(), manifest.seed.clone())?;
    mismatch("tileSize", config.tile_size.to_string(), manifest.tile_size.to_string())?;
    mismatch("chunkSize", config.chunk_size.to_string(), manifest.chunk_size.to_string())?;
    mismatch("regionChunks", config.region_chunks.to_string(), manifest.region_chunks.to_string())?;
    mismatch("generation fingerprint", config.terrain_fingerprint()?, manifest.fingerprint.clone())
}

/// Decode a region's records into chunks.
///
/// The records must cover every chunk of the region exactly once.
pub fn unpack_region(
    records: &[ChunkRecord],
    region: RegionCoord,
    chunk_size: i32,
    region_chunks: i32,
) -> Result<Vec<Chunk>, FetchError> {
    let mut seen = HashSet::new();
    let chunks = records
        .iter()
        .map(|record| {
            let chunk = Chunk::from_record(record, chunk_size)?;
            if chunk.coord.region(region_chunks) != region {
                return Err(FetchError::Misplaced { cx: record.cx, cy: record.cy, region });
            }
            if !seen.insert(chunk.coord) {
                return Err(FetchError::Duplicate { cx: record.cx, cy: record.cy, region });
            }
            Ok(chunk)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let expected = (region_chunks as usize).pow(2);
    if chunks.len() != expected {
        return Err(FetchError::Incomplete { region, expected, found: chunks.len() });
    }
    Ok(chunks)
}

/// A finished fetch
#[derive(Debug)]
pub struct FetchOutcome {
    pub region: RegionCoord,
    pub ticket: u64,
    pub result: Result<Vec<Chunk>, FetchError>,
}

/// Runs region fetches in the background.
pub struct RegionFetcher {
    runtime: Runtime,
    source: Arc<dyn RegionSource>,
    chunk_size: i32,
    region_chunks: i32,
    tx: UnboundedSender<FetchOutcome>,
    rx: UnboundedReceiver<FetchOutcome>,
    /// Newest request per region
    in_flight: HashMap<RegionCoord, (u64, JoinHandle<()>)>,
    next_ticket: u64,
}

impl RegionFetcher {
    pub fn new(source: Arc<dyn RegionSource>, chunk_size: i32, region_chunks: i32) -> Result<Self, FetchError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("region-fetch")
            .enable_all()
            .build()?;
        let (tx, rx) = unbounded_channel();

        Ok(Self {
            runtime,
            source,
            chunk_size,
            region_chunks,
            tx,
            rx,
            in_flight: HashMap::new(),
            next_ticket: 0,
        })
    }

    pub fn source(&self) -> &dyn RegionSource {
        self.source.as_ref()
    }

    /// Start fetching a region. Any earlier request for it is cancelled and its result
    /// will be discarded. Returns the ticket of the new request.
    pub fn request(&mut self, region: RegionCoord) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;

        if let Some((old, handle)) = self.in_flight.remove(&region) {
            debug!("Superseding fetch #{} of {}", old, region);
            handle.abort();
        }

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let (chunk_size, region_chunks) = (self.chunk_size, self.region_chunks);

        let handle = self.runtime.spawn(async move {
            let fetched = tokio::task::spawn_blocking(move || -> Result<Vec<Chunk>, FetchError> {
                let records = source.fetch(region)?;
                unpack_region(&records, region, chunk_size, region_chunks)
            })
            .await;

            let result = fetched.unwrap_or_else(|e| Err(FetchError::Task(e.to_string())));
            // The receiver only goes away with the fetcher itself
            let _ = tx.send(FetchOutcome { region, ticket, result });
        });

        debug!("Requested {} from {} (fetch #{})", region, self.source.describe(), ticket);
        self.in_flight.insert(region, (ticket, handle));
        ticket
    }

    pub fn is_pending(&self, region: RegionCoord) -> bool {
        self.in_flight.contains_key(&region)
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Drain finished fetches without blocking. Superseded results are dropped.
    pub fn poll(&mut self) -> Vec<FetchOutcome> {
        let mut done = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            if let Some(outcome) = self.accept(outcome) {
                done.push(outcome);
            }
        }
        done
    }

    /// Block until every outstanding fetch has finished.
    pub fn wait(&mut self) -> Vec<FetchOutcome> {
        let mut done = Vec::new();
        while !self.in_flight.is_empty() {
            match self.rx.blocking_recv() {
                Some(outcome) => {
                    if let Some(outcome) = self.accept(outcome) {
                        done.push(outcome);
                    }
                }
                None => break,
            }
        }
        done
    }

    fn accept(&mut self, outcome: FetchOutcome) -> Option<FetchOutcome> {
        match self.in_flight.get(&outcome.region) {
            Some((ticket, _)) if *ticket == outcome.ticket => {
                self.in_flight.remove(&outcome.region);
                if let Err(e) = &outcome.result {
                    warn!("Fetching {} failed: {}", outcome.region, e);
                }
                Some(outcome)
            }
            _ => {
                debug!("Dropping stale fetch #{} of {}", outcome.ticket, outcome.region);
                None
            }
        }
    }
}

//! Region baking
//!
//! Writes generated regions as `region_{rx}_{ry}.json` files plus a `manifest.json`,
//! the layout [`crate::fetch::DirRegionSource`] and static HTTP hosting read back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk::{ChunkRecord, LayerEncoding, RegionCoord};
use crate::context::WorldContext;
use crate::generator::generate_region;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Describes a directory of baked regions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub seed: String,
    pub tile_size: u32,
    pub chunk_size: u32,
    pub region_chunks: u32,
    /// [`crate::config::WorldConfig::terrain_fingerprint`] of the world the regions were baked from
    pub fingerprint: String,
    pub encoding: String,
    pub regions: Vec<RegionCoord>,
    pub generated_at: String,
}

/// Chunk records of one generated region, row-major
pub fn region_records(ctx: &WorldContext, region: RegionCoord, encoding: LayerEncoding) -> Vec<ChunkRecord> {
    generate_region(ctx, region).iter().map(|c| c.to_record(encoding)).collect()
}

/// Generate one region and write it into `dir`. Returns the written path.
pub fn bake_region<P: AsRef<Path>>(
    ctx: &WorldContext,
    region: RegionCoord,
    dir: P,
    encoding: LayerEncoding,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir.as_ref())?;
    let path = dir.as_ref().join(region.file_name());
    let records = region_records(ctx, region, encoding);
    fs::write(&path, serde_json::to_string(&records)?)?;
    Ok(path)
}

/// Bake every region in `regions` and write the manifest.
pub fn bake_regions<P: AsRef<Path>>(
    ctx: &WorldContext,
    regions: &[RegionCoord],
    dir: P,
    encoding: LayerEncoding,
) -> Result<Manifest, ExportError> {
    let dir = dir.as_ref();
    for (i, &region) in regions.iter().enumerate() {
        let path = bake_region(ctx, region, dir, encoding)?;
        info!("Baked {} ({}/{}) -> {}", region, i + 1, regions.len(), path.display());
    }

    let config = &ctx.config;
    let manifest = Manifest {
        seed: config.seed.text().to_string(),
        tile_size: config.tile_size,
        chunk_size: config.chunk_size,
        region_chunks: config.region_chunks,
        fingerprint: config.terrain_fingerprint()?,
        encoding: match encoding {
            LayerEncoding::Plain => "data".to_string(),
            LayerEncoding::Rle => "rle".to_string(),
        },
        regions: regions.to_vec(),
        generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;
    Ok(manifest)
}

/// Regions covering the inclusive rectangle `from..=to`, row-major.
pub fn region_range(from: RegionCoord, to: RegionCoord) -> Vec<RegionCoord> {
    let (x0, x1) = (from.x.min(to.x), from.x.max(to.x));
    let (y0, y1) = (from.y.min(to.y), from.y.max(to.y));
    (y0..=y1).flat_map(|y| (x0..=x1).map(move |x| RegionCoord::new(x, y))).collect()
}

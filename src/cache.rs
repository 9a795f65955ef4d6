//! Bounded chunk cache
//!
//! Least-recently-used eviction over generated or fetched chunks. Chunks touched
//! during the current frame are pinned and never evicted mid-frame; if a frame needs
//! more chunks than fit, the overflow is trimmed in `end_frame`.

use std::collections::HashSet;

use log::{debug, error};
use lru::LruCache;

use crate::chunk::{Chunk, ChunkCoord};

/// Cache statistics
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Number of evictions
    pub evictions: usize,
    /// Chunks currently resident
    pub resident: usize,
    pub capacity: usize,
    /// Inserted chunks that failed validation and were replaced by a blank one
    pub corrupted: usize,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }

    /// Format as human-readable string
    pub fn summary(&self) -> String {
        format!(
            "Hits: {} | Misses: {} | Rate: {:.1}% | Chunks: {}/{} | Evicted: {}",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.resident,
            self.capacity,
            self.evictions
        )
    }
}

pub struct ChunkCache {
    chunks: LruCache<ChunkCoord, Chunk>,
    capacity: usize,
    /// Chunks touched since `begin_frame`
    pinned: HashSet<ChunkCoord>,
    in_frame: bool,
    stats: CacheStats,
}

impl ChunkCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: LruCache::unbounded(),
            capacity,
            pinned: HashSet::new(),
            in_frame: false,
            stats: CacheStats { capacity, ..CacheStats::default() },
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains(&coord)
    }

    /// Look up a chunk, marking it most recently used. Counts a hit or a miss.
    pub fn get(&mut self, coord: ChunkCoord) -> Option<&Chunk> {
        if self.chunks.contains(&coord) {
            self.stats.hits += 1;
            self.pin(coord);
            self.chunks.get(&coord)
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Look up without touching recency or statistics
    pub fn peek(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.peek(&coord)
    }

    /// Return the cached chunk, or build it with `make` and insert it.
    pub fn get_or_insert_with<F>(&mut self, coord: ChunkCoord, make: F) -> &Chunk
    where
        F: FnOnce() -> Chunk,
    {
        let present = self.chunks.contains(&coord);
        if present {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            self.make_room();
        }
        self.pin(coord);
        self.stats.resident = self.chunks.len() + usize::from(!present);

        let stats = &mut self.stats;
        self.chunks.get_or_insert(coord, || sanitize(make(), stats))
    }

    /// Insert a chunk, evicting unpinned least-recently-used entries to stay in bounds.
    pub fn insert(&mut self, chunk: Chunk) {
        let chunk = sanitize(chunk, &mut self.stats);
        let coord = chunk.coord;
        if !self.chunks.contains(&coord) {
            self.make_room();
        }
        self.chunks.put(coord, chunk);
        self.pin(coord);
        self.stats.resident = self.chunks.len();
    }

    pub fn remove(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.pinned.remove(&coord);
        let removed = self.chunks.pop(&coord);
        self.stats.resident = self.chunks.len();
        removed
    }

    /// Start a frame: chunks touched from now on are protected from eviction.
    ///
    /// A frame still open from before is ended first.
    pub fn begin_frame(&mut self) {
        if self.in_frame {
            self.end_frame();
        }
        self.in_frame = true;
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// End a frame: release pins and trim back under capacity.
    pub fn end_frame(&mut self) {
        self.in_frame = false;
        self.pinned.clear();
        while self.chunks.len() > self.capacity {
            if !self.evict_one() {
                break;
            }
        }
        self.stats.resident = self.chunks.len();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.pinned.clear();
        self.stats.resident = 0;
    }

    fn pin(&mut self, coord: ChunkCoord) {
        if self.in_frame {
            self.pinned.insert(coord);
        }
    }

    fn make_room(&mut self) {
        while self.chunks.len() >= self.capacity {
            if !self.evict_one() {
                break;
            }
        }
    }

    /// Evict the least recently used unpinned chunk. Returns false if all are pinned.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .chunks
            .iter()
            .rev()
            .map(|(coord, _)| *coord)
            .find(|coord| !self.pinned.contains(coord));

        match victim {
            Some(coord) => {
                self.chunks.pop(&coord);
                self.stats.evictions += 1;
                debug!("Evicted {}", coord);
                true
            }
            None => false,
        }
    }
}

/// Chunks with inconsistent layers are a bug upstream: debug builds assert, release
/// builds log and keep a blank chunk in their place.
fn sanitize(chunk: Chunk, stats: &mut CacheStats) -> Chunk {
    match chunk.validate() {
        Ok(()) => chunk,
        Err(e) => {
            debug_assert!(false, "corrupted {} entering cache: {}", chunk.coord, e);
            error!("Corrupted {} entering cache ({}), storing blank chunk", chunk.coord, e);
            stats.corrupted += 1;
            Chunk::blank(chunk.coord, chunk.size)
        }
    }
}

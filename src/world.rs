//! World query surface
//!
//! What the renderer and movement code talk to: tile info at a position, the chunks
//! covering the camera, and coarse minimap sampling. Owns the chunk cache and, when
//! regions are pre-generated, the background fetcher.
//!
//! Frame protocol: call [`World::begin_frame`], make any number of queries, then
//! [`World::end_frame`]. Chunks touched in between are never evicted before the frame ends.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use log::{debug, info, warn};
use lru::LruCache;
use serde::Serialize;
use thiserror::Error;

use crate::biomes::{classify_biome, Biome};
use crate::cache::{CacheStats, ChunkCache};
use crate::chunk::{Chunk, ChunkCoord, ChunkError, RegionCoord, TileCoord};
use crate::config::{ConfigError, PixelPos, WorldConfig};
use crate::context::WorldContext;
use crate::export::ExportError;
use crate::fetch::{
    check_manifest, DirRegionSource, FetchError, FetchOutcome, HttpRegionSource, RegionFetcher, RegionSource,
};
use crate::generator::{generate_chunk, generate_chunks};
use crate::landmarks::LandmarkSet;
use crate::minimap::MinimapGrid;

/// Fetched regions kept unpacked until their chunks are requested. Grows to hold
/// every region delivered by a single pump.
const STAGED_REGIONS: usize = 4;

/// Top-level error
#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// What a tile means for movement
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileInfo {
    pub tile: TileCoord,
    /// `None` while the owning chunk is still being fetched
    pub biome: Option<Biome>,
    pub name: &'static str,
    pub solid: bool,
    pub speed_multiplier: f64,
}

impl TileInfo {
    fn from_biome(tile: TileCoord, biome: Biome) -> Self {
        Self {
            tile,
            biome: Some(biome),
            name: biome.name(),
            solid: biome.is_solid(),
            speed_multiplier: biome.speed_multiplier(),
        }
    }

    /// Placeholder for a tile whose chunk has not arrived: passable at full speed.
    pub fn loading(tile: TileCoord) -> Self {
        Self {
            tile,
            biome: None,
            name: "loading",
            solid: false,
            speed_multiplier: 1.0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.biome.is_some()
    }
}

/// Axis-aligned rectangle in world pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WorldRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle of `width × height` centered on `center`
    pub fn centered(center: PixelPos, width: f64, height: f64) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }
}

pub struct World {
    ctx: WorldContext,
    cache: ChunkCache,
    fetcher: Option<RegionFetcher>,
    /// Fetched regions not yet moved into the cache
    staged: LruCache<RegionCoord, HashMap<ChunkCoord, Chunk>>,
    /// Regions whose fetch failed; generated locally from now on
    failed: HashSet<RegionCoord>,
    /// Chunks queried while their region was in flight; cached as soon as it lands
    wanted: HashSet<ChunkCoord>,
}

impl World {
    /// Open a world. Streams from `regionDir` or `regionBaseUrl` when configured,
    /// otherwise generates everything locally.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        let source: Option<Arc<dyn RegionSource>> = match (&config.region_dir, &config.region_base_url) {
            (Some(dir), _) => Some(Arc::new(DirRegionSource::new(dir))),
            (None, Some(url)) => Some(Arc::new(HttpRegionSource::new(url.clone())?)),
            (None, None) => None,
        };
        Self::build(config, source)
    }

    /// Open a world that generates every chunk locally.
    pub fn generated(config: WorldConfig) -> Result<Self, WorldError> {
        Self::build(config, None)
    }

    /// Open a world that streams regions from `source`.
    pub fn with_region_source(config: WorldConfig, source: Arc<dyn RegionSource>) -> Result<Self, WorldError> {
        Self::build(config, Some(source))
    }

    fn build(config: WorldConfig, source: Option<Arc<dyn RegionSource>>) -> Result<Self, WorldError> {
        let ctx = WorldContext::new(config)?;
        let fetcher = match source {
            Some(source) => {
                let manifest = source.manifest()?;
                check_manifest(&manifest, &ctx.config)?;
                info!(
                    "Streaming regions from {} (baked {})",
                    source.describe(),
                    manifest.generated_at
                );
                Some(RegionFetcher::new(source, ctx.chunk_size(), ctx.region_chunks())?)
            }
            None => None,
        };
        let cache = ChunkCache::new(ctx.config.cache_capacity);
        let staged = LruCache::new(NonZeroUsize::new(STAGED_REGIONS).unwrap_or(NonZeroUsize::MIN));

        Ok(Self {
            ctx,
            cache,
            fetcher,
            staged,
            failed: HashSet::new(),
            wanted: HashSet::new(),
        })
    }

    pub fn context(&self) -> &WorldContext {
        &self.ctx
    }

    pub fn config(&self) -> &WorldConfig {
        &self.ctx.config
    }

    pub fn landmarks(&self) -> &LandmarkSet {
        &self.ctx.landmarks
    }

    pub fn is_streaming(&self) -> bool {
        self.fetcher.is_some()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_chunks(&self) -> usize {
        self.cache.len()
    }

    /// Region fetches still in flight
    pub fn pending_fetches(&self) -> usize {
        self.fetcher.as_ref().map_or(0, |f| f.pending_count())
    }

    /// Spawn position in world pixels (center of the spawn tile)
    pub fn spawn_position(&self) -> PixelPos {
        let (tx, ty) = self.ctx.spawn_tile();
        let ts = self.ctx.tile_size();
        PixelPos {
            x: (tx as f64 + 0.5) * ts,
            y: (ty as f64 + 0.5) * ts,
        }
    }

    pub fn tile_at(&self, wx: f64, wy: f64) -> TileCoord {
        TileCoord::from_world(wx, wy, self.ctx.tile_size())
    }

    /// Start a frame: absorbs finished fetches and pins everything touched until `end_frame`.
    pub fn begin_frame(&mut self) {
        self.cache.begin_frame();
        self.pump();
    }

    /// End a frame: unpins and trims the cache back to capacity.
    pub fn end_frame(&mut self) {
        self.cache.end_frame();
    }

    /// Move finished fetches into the staging area. Returns how many regions arrived.
    pub fn pump(&mut self) -> usize {
        let outcomes = match self.fetcher.as_mut() {
            Some(fetcher) => fetcher.poll(),
            None => return 0,
        };
        self.absorb(outcomes)
    }

    /// Block until every outstanding fetch has finished, then absorb the results.
    pub fn wait_for_fetches(&mut self) -> usize {
        let outcomes = match self.fetcher.as_mut() {
            Some(fetcher) => fetcher.wait(),
            None => return 0,
        };
        self.absorb(outcomes)
    }

    fn absorb(&mut self, outcomes: Vec<FetchOutcome>) -> usize {
        let count = outcomes.len();
        if count > self.staged.cap().get() {
            if let Some(cap) = NonZeroUsize::new(count) {
                debug!("Growing region staging to {}", count);
                self.staged.resize(cap);
            }
        }

        let region_chunks = self.ctx.region_chunks();
        for outcome in outcomes {
            match outcome.result {
                Ok(chunks) => {
                    debug!("Unpacked {} ({} chunks)", outcome.region, chunks.len());
                    let mut rest = HashMap::new();
                    for chunk in chunks {
                        // A resident copy came from an older fetch of this region
                        self.cache.remove(chunk.coord);
                        if self.wanted.remove(&chunk.coord) {
                            self.cache.insert(chunk);
                        } else {
                            rest.insert(chunk.coord, chunk);
                        }
                    }
                    if !rest.is_empty() {
                        self.staged.put(outcome.region, rest);
                    }
                }
                Err(e) => {
                    warn!("{} unavailable ({}), generating locally", outcome.region, e);
                    self.failed.insert(outcome.region);
                    self.wanted.retain(|c| c.region(region_chunks) != outcome.region);
                }
            }
        }
        count
    }

    /// Re-request a region. In streaming mode the newest request wins; otherwise the
    /// region's chunks are simply regenerated on next access.
    pub fn reload_region(&mut self, region: RegionCoord) {
        let streaming = self.is_streaming();
        for coord in region.chunks(self.ctx.region_chunks()) {
            if self.cache.remove(coord).is_some() && streaming {
                self.wanted.insert(coord);
            }
        }
        self.staged.pop(&region);
        self.failed.remove(&region);
        if let Some(fetcher) = self.fetcher.as_mut() {
            fetcher.request(region);
        }
    }

    /// Make sure the given chunks are resident (or requested), generating local misses
    /// in parallel. Every resident chunk is pinned for the current frame.
    fn ensure(&mut self, coords: &[ChunkCoord]) {
        self.pump();
        let region_chunks = self.ctx.region_chunks();
        let mut to_generate = Vec::new();

        for &coord in coords {
            if self.cache.get(coord).is_some() {
                continue;
            }
            let region = coord.region(region_chunks);
            if let Some(chunk) = self.staged.get_mut(&region).and_then(|m| m.remove(&coord)) {
                self.cache.insert(chunk);
                continue;
            }
            match self.fetcher.as_mut() {
                Some(fetcher) if !self.failed.contains(&region) => {
                    if !fetcher.is_pending(region) {
                        fetcher.request(region);
                    }
                    self.wanted.insert(coord);
                }
                _ => to_generate.push(coord),
            }
        }

        if !to_generate.is_empty() {
            debug!("Generating {} chunks", to_generate.len());
            for chunk in generate_chunks(&self.ctx, &to_generate) {
                self.cache.insert(chunk);
            }
        }
    }

    /// The chunk at `coord` if it is resident or can be produced now.
    ///
    /// In streaming mode a missing chunk triggers a region fetch and yields `None`
    /// until it arrives.
    pub fn try_chunk(&mut self, coord: ChunkCoord) -> Option<&Chunk> {
        self.ensure(&[coord]);
        self.cache.peek(coord)
    }

    /// The chunk at `coord`, generating it synchronously if it is not resident.
    pub fn get_chunk(&mut self, coord: ChunkCoord) -> &Chunk {
        let ctx = &self.ctx;
        self.cache.get_or_insert_with(coord, || generate_chunk(ctx, coord))
    }

    /// Tile info at a world-pixel position.
    pub fn tile_info_at_world_pos(&mut self, wx: f64, wy: f64) -> TileInfo {
        let tile = self.tile_at(wx, wy);
        self.tile_info_at_tile(tile)
    }

    pub fn tile_info_at_tile(&mut self, tile: TileCoord) -> TileInfo {
        if let Some(bounds) = self.ctx.config.bounds {
            if !bounds.contains(tile.x, tile.y) {
                return TileInfo::from_biome(tile, Biome::Void);
            }
        }

        let size = self.ctx.chunk_size();
        let (lx, ly) = tile.local(size);
        match self.try_chunk(tile.chunk(size)) {
            Some(chunk) => TileInfo::from_biome(tile, chunk.biome_at(lx, ly)),
            None => TileInfo::loading(tile),
        }
    }

    /// Chunks covering `rect` plus the configured margin, row-major.
    ///
    /// Opens a frame if none is open so the returned chunks stay pinned until
    /// `end_frame`. In streaming mode chunks still in flight are left out.
    pub fn visible_chunks(&mut self, rect: WorldRect) -> Vec<&Chunk> {
        if !self.cache.in_frame() {
            self.begin_frame();
        }

        let coords = self.visible_chunk_coords(rect);
        self.ensure(&coords);
        coords.iter().filter_map(|&c| self.cache.peek(c)).collect()
    }

    /// Chunk coordinates covering `rect` plus margin, row-major.
    pub fn visible_chunk_coords(&self, rect: WorldRect) -> Vec<ChunkCoord> {
        let size = self.ctx.chunk_size();
        let margin = self.ctx.config.view_margin_tiles;
        let min = self.tile_at(rect.x, rect.y);
        let max = self.tile_at(rect.x + rect.width.max(0.0), rect.y + rect.height.max(0.0));

        let c0 = TileCoord::new(min.x.saturating_sub(margin), min.y.saturating_sub(margin)).chunk(size);
        let c1 = TileCoord::new(max.x.saturating_add(margin), max.y.saturating_add(margin)).chunk(size);
        (c0.y..=c1.y)
            .flat_map(|cy| (c0.x..=c1.x).map(move |cx| ChunkCoord::new(cx, cy)))
            .collect()
    }

    /// Sample a `resolution × resolution` biome grid centered on `center`, covering
    /// `radius_tiles` in each direction.
    ///
    /// Resident chunks are read directly; everything else goes through the classifier
    /// (the function chunks are generated from), so sampling never churns the cache.
    /// In streaming mode, regions not yet loaded show as loading.
    pub fn sample_for_minimap(&self, center: PixelPos, radius_tiles: i32, resolution: usize) -> MinimapGrid {
        let resolution = resolution.max(1);
        let radius = radius_tiles.clamp(0, i32::MAX / 2 - 1);
        let center = self.tile_at(center.x, center.y);
        let origin = TileCoord::new(center.x.saturating_sub(radius), center.y.saturating_sub(radius));
        let stride = (2 * radius + 1) as f64 / resolution as f64;
        let size = self.ctx.chunk_size();
        let region_chunks = self.ctx.region_chunks();

        let mut cells = Vec::with_capacity(resolution * resolution);
        for j in 0..resolution {
            for i in 0..resolution {
                let tile = TileCoord::new(
                    origin.x.saturating_add(((i as f64 + 0.5) * stride).floor() as i32),
                    origin.y.saturating_add(((j as f64 + 0.5) * stride).floor() as i32),
                );
                let coord = tile.chunk(size);
                let (lx, ly) = tile.local(size);

                let cell = if let Some(chunk) = self.cache.peek(coord) {
                    Some(chunk.biome_at(lx, ly))
                } else if self.is_streaming() && !self.failed.contains(&coord.region(region_chunks)) {
                    self.staged
                        .peek(&coord.region(region_chunks))
                        .and_then(|m| m.get(&coord))
                        .map(|chunk| chunk.biome_at(lx, ly))
                } else {
                    Some(classify_biome(&self.ctx, tile.x, tile.y))
                };
                cells.push(cell);
            }
        }

        MinimapGrid {
            width: resolution,
            height: resolution,
            origin,
            stride,
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkRecord, LayerEncoding};
    use crate::export::{bake_regions, region_range};
    use crate::seeds::WorldSeed;

    fn scenario_config() -> WorldConfig {
        let mut config = WorldConfig::with_seed(WorldSeed::new("alttp-continent-001"));
        config.tile_size = 32;
        config.chunk_size = 32;
        config.spawn = Some(PixelPos { x: 128.0 * 32.0 + 16.0, y: 85.0 * 32.0 + 16.0 });
        config
    }

    #[test]
    fn test_spawn_is_walkable() {
        let mut world = World::generated(scenario_config()).unwrap();
        let spawn = TileCoord::new(128, 85);
        assert_eq!(spawn.chunk(32), ChunkCoord::new(4, 2));

        let chunk = world.get_chunk(ChunkCoord::new(4, 2));
        let biome = chunk.biome_at(0, 21);
        assert_ne!(biome, Biome::Water);
        assert_ne!(biome, Biome::Void);

        let info = world.tile_info_at_world_pos(128.0 * 32.0 + 5.0, 85.0 * 32.0 + 5.0);
        assert_eq!(info.tile, spawn);
        assert!(!info.solid);
        assert_eq!(info.speed_multiplier, 1.0);
    }

    #[test]
    fn test_lake_center_is_water() {
        let mut world = World::generated(scenario_config()).unwrap();
        let (lx, ly) = world.landmarks().lake.center.tile();
        let info = world.tile_info_at_world_pos(lx as f64 * 32.0 + 16.0, ly as f64 * 32.0 + 16.0);

        assert_eq!(info.biome, Some(Biome::Water));
        assert_eq!(info.name, "water");
        assert!(!info.solid);
        assert!(info.speed_multiplier < 1.0);
    }

    #[test]
    fn test_far_away_is_meadow() {
        let mut world = World::generated(scenario_config()).unwrap();
        let spawn = world.spawn_position();
        let info = world.tile_info_at_world_pos(spawn.x + 3000.0 * 32.0, spawn.y + 3000.0 * 32.0);
        assert_eq!(info.biome, Some(Biome::Meadow));
        assert_eq!(info.speed_multiplier, 1.0);
    }

    #[test]
    fn test_query_is_idempotent() {
        let mut world = World::generated(scenario_config()).unwrap();
        for (wx, wy) in [(0.0, 0.0), (-5000.5, 123.0), (4100.0, 2730.0)] {
            let a = world.tile_info_at_world_pos(wx, wy);
            let b = world.tile_info_at_world_pos(wx, wy);
            assert_eq!(a, b);
            assert!(a.speed_multiplier.is_finite());
        }
    }

    #[test]
    fn test_cache_stays_bounded() {
        let mut config = scenario_config();
        config.cache_capacity = 16;
        let mut world = World::generated(config).unwrap();

        for i in 0..60 {
            world.tile_info_at_tile(TileCoord::new(i * 32, -i * 32));
            assert!(world.cached_chunks() <= 16);
        }

        // A frame wider than the cache keeps its chunks until it ends
        world.begin_frame();
        let rect = WorldRect::new(0.0, 0.0, 32.0 * 32.0 * 6.0, 32.0 * 32.0 * 4.0);
        let visible = world.visible_chunks(rect);
        assert!(visible.len() > 16);
        world.end_frame();
        assert!(world.cached_chunks() <= 16);
    }

    #[test]
    fn test_visible_chunks_cover_rect_with_margin() {
        let mut world = World::generated(scenario_config()).unwrap();
        // Exactly one chunk, margin pulls in the neighbours
        let rect = WorldRect::new(32.0 * 32.0, 32.0 * 32.0, 32.0 * 32.0 - 1.0, 32.0 * 32.0 - 1.0);
        let coords = world.visible_chunk_coords(rect);
        assert_eq!(coords.len(), 9);
        assert_eq!(coords[0], ChunkCoord::new(0, 0));
        assert_eq!(coords[8], ChunkCoord::new(2, 2));

        let chunks = world.visible_chunks(rect);
        let got: Vec<_> = chunks.iter().map(|c| c.coord).collect();
        assert_eq!(got, coords);
        world.end_frame();
    }

    #[test]
    fn test_outside_bounds_is_void() {
        let mut config = scenario_config();
        config.bounds = Some(crate::config::TileBounds { min_x: 0, min_y: 0, max_x: 256, max_y: 256 });
        let mut world = World::generated(config).unwrap();

        let info = world.tile_info_at_tile(TileCoord::new(-3, 10));
        assert_eq!(info.biome, Some(Biome::Void));
        assert!(info.solid);
        let inside = world.tile_info_at_tile(TileCoord::new(128, 85));
        assert!(!inside.solid);
    }

    #[test]
    fn test_minimap_matches_tile_info() {
        let mut world = World::generated(scenario_config()).unwrap();
        let spawn = world.spawn_position();
        let grid = world.sample_for_minimap(spawn, 64, 16);
        assert_eq!(grid.cells.len(), 256);

        for j in (0..16).step_by(5) {
            for i in (0..16).step_by(3) {
                let tile = TileCoord::new(
                    grid.origin.x + ((i as f64 + 0.5) * grid.stride).floor() as i32,
                    grid.origin.y + ((j as f64 + 0.5) * grid.stride).floor() as i32,
                );
                assert_eq!(grid.get(i, j), world.tile_info_at_tile(tile).biome);
            }
        }
        // Tiles now resident are read from the cache and agree too
        let again = world.sample_for_minimap(spawn, 64, 16);
        assert_eq!(again, grid);
    }

    #[test]
    fn test_streamed_chunks_match_generated() {
        let mut config = scenario_config();
        config.chunk_size = 16;
        config.region_chunks = 2;
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorldContext::new(config.clone()).unwrap();
        let regions = [RegionCoord::new(4, 2), RegionCoord::new(3, 2)];
        bake_regions(&ctx, &regions, dir.path(), LayerEncoding::Rle).unwrap();

        let source = Arc::new(DirRegionSource::new(dir.path()));
        let mut streamed = World::with_region_source(config.clone(), source).unwrap();
        let mut local = World::generated(config).unwrap();

        let tile = TileCoord::new(128, 85);
        let first = streamed.tile_info_at_tile(tile);
        assert_eq!(first, TileInfo::loading(tile));
        assert!(!first.solid);

        streamed.wait_for_fetches();
        assert_eq!(streamed.tile_info_at_tile(tile), local.tile_info_at_tile(tile));

        for coord in RegionCoord::new(4, 2).chunks(2) {
            let fetched = streamed.try_chunk(coord).cloned().unwrap();
            assert_eq!(&fetched, local.get_chunk(coord));
        }
    }

    /// Small chunks and regions so streaming tests touch little terrain
    fn streaming_config(region_chunks: u32) -> WorldConfig {
        let mut config = scenario_config();
        config.chunk_size = 8;
        config.region_chunks = region_chunks;
        config
    }

    #[test]
    fn test_failed_fetch_falls_back_to_generation() {
        let config = scenario_config();
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorldContext::new(config.clone()).unwrap();
        bake_regions(&ctx, &[], dir.path(), LayerEncoding::Plain).unwrap();
        let source = Arc::new(DirRegionSource::new(dir.path()));
        let mut world = World::with_region_source(config.clone(), source).unwrap();
        let mut local = World::generated(config).unwrap();

        let tile = TileCoord::new(-400, 900);
        assert!(!world.tile_info_at_tile(tile).is_loaded());
        world.wait_for_fetches();

        let info = world.tile_info_at_tile(tile);
        assert!(info.is_loaded());
        assert_eq!(info, local.tile_info_at_tile(tile));
    }

    #[test]
    fn test_reload_region_refetches() {
        let mut config = scenario_config();
        config.chunk_size = 8;
        config.region_chunks = 1;
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorldContext::new(config.clone()).unwrap();
        bake_regions(&ctx, &[RegionCoord::new(0, 0)], dir.path(), LayerEncoding::Plain).unwrap();

        let source = Arc::new(DirRegionSource::new(dir.path()));
        let mut world = World::with_region_source(config, source).unwrap();
        assert!(world.try_chunk(ChunkCoord::new(0, 0)).is_none());
        world.wait_for_fetches();
        assert!(world.try_chunk(ChunkCoord::new(0, 0)).is_some());

        world.reload_region(RegionCoord::new(0, 0));
        assert!(world.try_chunk(ChunkCoord::new(0, 0)).is_none());
        assert_eq!(world.wait_for_fetches(), 1);
        assert_eq!(world.try_chunk(ChunkCoord::new(0, 0)).map(|c| c.coord), Some(ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_partial_region_falls_back_to_generation() {
        let config = streaming_config(2);
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorldContext::new(config.clone()).unwrap();
        let region = RegionCoord::new(0, 0);
        bake_regions(&ctx, &[region], dir.path(), LayerEncoding::Rle).unwrap();

        // Drop chunk (1, 1) from the region file
        let path = dir.path().join(region.file_name());
        let mut records: Vec<ChunkRecord> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!((records[3].cx, records[3].cy), (1, 1));
        records.pop();
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let source = Arc::new(DirRegionSource::new(dir.path()));
        let mut world = World::with_region_source(config.clone(), source).unwrap();
        let mut local = World::generated(config).unwrap();

        let tile = TileCoord::new(12, 12);
        assert!(!world.tile_info_at_tile(tile).is_loaded());
        world.wait_for_fetches();

        let info = world.tile_info_at_tile(tile);
        assert!(info.is_loaded());
        assert_eq!(info, local.tile_info_at_tile(tile));
        assert_eq!(world.pending_fetches(), 0);
        for coord in region.chunks(2) {
            assert_eq!(world.try_chunk(coord).cloned().as_ref(), Some(local.get_chunk(coord)));
        }
    }

    #[test]
    fn test_bake_from_another_world_is_refused() {
        let config = streaming_config(2);
        let dir = tempfile::tempdir().unwrap();
        let mut other = config.clone();
        other.seed = WorldSeed::new("some-other-seed");
        let ctx = WorldContext::new(other).unwrap();
        bake_regions(&ctx, &[RegionCoord::new(8, 5)], dir.path(), LayerEncoding::Plain).unwrap();

        let source = Arc::new(DirRegionSource::new(dir.path()));
        let opened = World::with_region_source(config.clone(), source);
        assert!(matches!(
            opened,
            Err(WorldError::Fetch(FetchError::Mismatch { what: "seed", .. }))
        ));

        let mut retuned = config.clone();
        retuned.seed = WorldSeed::new("some-other-seed");
        retuned.generation.woods.radius = 50.0;
        let source = Arc::new(DirRegionSource::new(dir.path()));
        assert!(matches!(
            World::with_region_source(retuned, source),
            Err(WorldError::Fetch(FetchError::Mismatch { what: "generation fingerprint", .. }))
        ));

        // No manifest at all
        let empty = tempfile::tempdir().unwrap();
        let source = Arc::new(DirRegionSource::new(empty.path()));
        assert!(matches!(
            World::with_region_source(config, source),
            Err(WorldError::Fetch(FetchError::Io(_)))
        ));
    }

    #[test]
    fn test_regions_arriving_together_are_all_kept() {
        let config = streaming_config(1);
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorldContext::new(config.clone()).unwrap();
        let regions = region_range(RegionCoord::new(-1, -1), RegionCoord::new(1, 1));
        bake_regions(&ctx, &regions, dir.path(), LayerEncoding::Rle).unwrap();

        let source = Arc::new(DirRegionSource::new(dir.path()));
        let mut world = World::with_region_source(config, source).unwrap();

        // Chunks (-1, -1)..=(1, 1) once the margin is added
        let rect = WorldRect::new(0.0, 0.0, 255.0, 255.0);
        assert_eq!(world.visible_chunk_coords(rect).len(), 9);
        assert!(world.visible_chunks(rect).is_empty());
        world.end_frame();
        assert_eq!(world.pending_fetches(), 9);

        assert_eq!(world.wait_for_fetches(), 9);
        assert_eq!(world.visible_chunks(rect).len(), 9);
        world.end_frame();
        assert_eq!(world.pending_fetches(), 0);
    }

    #[test]
    fn test_unrequested_regions_stay_staged() {
        let config = streaming_config(1);
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorldContext::new(config.clone()).unwrap();
        let regions = region_range(RegionCoord::new(0, 0), RegionCoord::new(5, 0));
        bake_regions(&ctx, &regions, dir.path(), LayerEncoding::Plain).unwrap();

        let source = Arc::new(DirRegionSource::new(dir.path()));
        let mut world = World::with_region_source(config, source).unwrap();
        for &region in &regions {
            world.reload_region(region);
        }
        assert_eq!(world.wait_for_fetches(), 6);

        for region in regions {
            let coord = ChunkCoord::new(region.x, region.y);
            assert_eq!(world.try_chunk(coord).map(|c| c.coord), Some(coord));
        }
        assert_eq!(world.pending_fetches(), 0);
    }

    #[test]
    fn test_huge_coordinates_do_not_panic() {
        let mut world = World::generated(scenario_config()).unwrap();

        let coords = world.visible_chunk_coords(WorldRect::new(1e12, 0.0, 64.0, 64.0));
        assert!(!coords.is_empty());
        let far = world.visible_chunk_coords(WorldRect::new(-1e12, -1e12, 64.0, 64.0));
        assert!(!far.is_empty());

        let grid = world.sample_for_minimap(world.spawn_position(), i32::MAX, 2);
        assert_eq!(grid.cells.len(), 4);
        assert!(grid.cells.iter().all(|c| c.is_some()));

        let info = world.tile_info_at_world_pos(1e12, -1e12);
        assert!(info.is_loaded());
    }
}

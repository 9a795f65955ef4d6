//! Chunk and region generation.
//!
//! `generate_chunk` runs the classifier over every tile of a chunk and packs the result
//! into layers. A region is just the same function mapped over its chunks, so the two
//! paths produce identical tiles.

use log::debug;
use rayon::prelude::*;

use crate::biomes::{classify, classify_terrain, decorate, pick_palette, Biome};
use crate::chunk::{Chunk, ChunkCoord, LayerKind, RegionCoord};
use crate::context::WorldContext;

/// Generate one chunk. Pure: same context and coordinate, same layers.
pub fn generate_chunk(ctx: &WorldContext, coord: ChunkCoord) -> Chunk {
    let size = ctx.chunk_size();
    let origin = coord.origin(size);
    let mut chunk = Chunk::empty(coord, size);

    for ly in 0..size {
        for lx in 0..size {
            let tx = origin.x + lx;
            let ty = origin.y + ly;
            let class = classify(ctx, tx, ty);

            match class.biome {
                Biome::Water => {
                    chunk.set(LayerKind::Water, lx, ly, class.tile_index);
                }
                Biome::Road => {
                    // Ground under the paving keeps the surrounding terrain
                    let terrain = classify_terrain(ctx, tx, ty);
                    chunk.set(LayerKind::Ground, lx, ly, pick_palette(ctx, terrain, tx, ty));
                    chunk.set(LayerKind::Stone, lx, ly, class.tile_index);
                }
                Biome::Void => {
                    chunk.set(LayerKind::Ground, lx, ly, class.tile_index);
                }
                land => {
                    chunk.set(LayerKind::Ground, lx, ly, class.tile_index);

                    let deco = decorate(ctx, land, tx, ty);
                    if let Some(detail) = deco.detail {
                        chunk.set(LayerKind::Decorations, lx, ly, detail);
                    }
                    if let Some((kind, frame)) = deco.prop {
                        chunk.set(LayerKind::Objects, lx, ly, frame);
                        chunk.set(LayerKind::Shadows, lx, ly, kind.shadow_frame());
                    }
                }
            }
        }
    }

    chunk
}

/// Generate every chunk of a region in parallel, returned in row-major order.
pub fn generate_region(ctx: &WorldContext, region: RegionCoord) -> Vec<Chunk> {
    let coords: Vec<ChunkCoord> = region.chunks(ctx.region_chunks()).collect();
    debug!("Generating {} ({} chunks)", region, coords.len());

    coords.into_par_iter().map(|coord| generate_chunk(ctx, coord)).collect()
}

/// Generate an arbitrary set of chunks in parallel, preserving input order.
pub fn generate_chunks(ctx: &WorldContext, coords: &[ChunkCoord]) -> Vec<Chunk> {
    coords.par_iter().map(|&coord| generate_chunk(ctx, coord)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{TileCoord, EMPTY_TILE};
    use crate::config::{PixelPos, WorldConfig};
    use crate::seeds::WorldSeed;

    fn context(chunk_size: u32, region_chunks: u32) -> WorldContext {
        let mut config = WorldConfig::with_seed(WorldSeed::new("alttp-continent-001"));
        config.chunk_size = chunk_size;
        config.region_chunks = region_chunks;
        config.spawn = Some(PixelPos { x: 128.0 * 32.0, y: 85.0 * 32.0 });
        WorldContext::new(config).unwrap()
    }

    #[test]
    fn test_chunk_generation_is_deterministic() {
        let ctx = context(32, 4);
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-3, -7), ChunkCoord::new(4, 2), ChunkCoord::new(-1, 12)] {
            let a = generate_chunk(&ctx, coord);
            // A fresh context stands in for a process restart
            let b = generate_chunk(&context(32, 4), coord);
            assert_eq!(a, b, "{} differs between runs", coord);
            assert!(a.validate().is_ok());
        }
    }

    #[test]
    fn test_region_matches_chunks() {
        let ctx = context(16, 3);
        for region in [RegionCoord::new(0, 0), RegionCoord::new(-1, 2), RegionCoord::new(3, -2)] {
            let chunks = generate_region(&ctx, region);
            assert_eq!(chunks.len(), 9);
            for chunk in chunks {
                assert_eq!(chunk, generate_chunk(&ctx, chunk.coord));
                assert_eq!(chunk.coord.region(3), region);
            }
        }
    }

    #[test]
    fn test_water_only_on_water_layer() {
        let ctx = context(32, 1);
        let (lx, ly) = ctx.landmarks.lake.center.tile();
        let coord = TileCoord::new(lx, ly).chunk(32);
        let chunk = generate_chunk(&ctx, coord);

        let water = chunk.layer(LayerKind::Water);
        let ground = chunk.layer(LayerKind::Ground);
        let objects = chunk.layer(LayerKind::Objects);
        assert!(water.iter().all(|&t| t != EMPTY_TILE), "lake center chunk should be all water");
        assert!(ground.iter().all(|&t| t == EMPTY_TILE));
        assert!(objects.iter().all(|&t| t == EMPTY_TILE));
    }

    #[test]
    fn test_road_keeps_ground_beneath() {
        let ctx = context(32, 1);
        let (sx, sy) = ctx.spawn_tile();
        let spawn = TileCoord::new(sx, sy);
        let chunk = generate_chunk(&ctx, spawn.chunk(32));
        let (lx, ly) = spawn.local(32);

        assert_eq!(chunk.biome_at(lx, ly), Biome::Road);
        assert_ne!(chunk.get(LayerKind::Ground, lx, ly), Some(EMPTY_TILE));
        assert_eq!(chunk.get(LayerKind::Objects, lx, ly), Some(EMPTY_TILE));
    }

    #[test]
    fn test_layers_agree_with_classifier() {
        let ctx = context(16, 1);
        let coord = ChunkCoord::new(5, 7);
        let chunk = generate_chunk(&ctx, coord);
        let origin = coord.origin(16);
        for ly in 0..16 {
            for lx in 0..16 {
                let class = classify(&ctx, origin.x + lx, origin.y + ly);
                assert_eq!(chunk.biome_at(lx, ly), class.biome);
            }
        }
    }

    #[test]
    fn test_generate_chunks_keeps_order() {
        let ctx = context(8, 1);
        let coords = [ChunkCoord::new(3, 3), ChunkCoord::new(-5, 0), ChunkCoord::new(0, 9)];
        let chunks = generate_chunks(&ctx, &coords);
        let got: Vec<_> = chunks.iter().map(|c| c.coord).collect();
        assert_eq!(got, coords.to_vec());
    }
}

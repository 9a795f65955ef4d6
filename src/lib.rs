//! Deterministic procedural tile world
//!
//! Seeded landmark layout, noise-driven biome classification, chunk and region
//! generation, a bounded chunk cache and the query surface a renderer consumes.

pub mod biomes;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod context;
pub mod export;
pub mod fetch;
pub mod fields;
pub mod generator;
pub mod landmarks;
pub mod minimap;
pub mod seeds;
pub mod world;

pub use biomes::Biome;
pub use chunk::{Chunk, ChunkCoord, RegionCoord, TileCoord};
pub use config::WorldConfig;
pub use context::WorldContext;
pub use seeds::WorldSeed;
pub use world::{TileInfo, World, WorldError, WorldRect};

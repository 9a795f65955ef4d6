//! Seed-scoped world context.
//!
//! Everything the classifier and generator read: config, seed, landmarks, climate
//! fields and the per-system salts. Built once when a world is activated; cloning is
//! cheap and the value is shared freely across generation threads.

use std::sync::Arc;

use log::info;

use crate::config::{ConfigError, WorldConfig};
use crate::fields::ClimateFields;
use crate::landmarks::{derive_landmarks, LandmarkSet};
use crate::seeds::WorldSeed;

#[derive(Clone, Debug)]
pub struct WorldContext {
    pub config: Arc<WorldConfig>,
    pub landmarks: Arc<LandmarkSet>,
    pub fields: ClimateFields,
    /// Salt for palette variant picks
    pub palette_seed: u64,
    /// Salt for decoration draws
    pub decor_seed: u64,
    /// Salt for decoration variant picks
    pub variant_seed: u64,
    /// Salt for ruin cluster cells
    pub ruin_seed: u64,
}

impl WorldContext {
    /// Validate the config and derive everything seed-dependent.
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: WorldConfig) -> Self {
        let seed = &config.seed;
        let gen = &config.generation;
        let landmarks = derive_landmarks(seed, gen, config.spawn_tile());
        let fields = ClimateFields::new(seed, gen.height_scale, gen.moisture_scale, gen.heat_scale, gen.noise_octaves);

        info!("Activated world seed {}", seed);
        info!("Landmarks: {}", landmarks.summary());

        Self {
            palette_seed: seed.derive("palette"),
            decor_seed: seed.derive("decor"),
            variant_seed: seed.derive("decor-variant"),
            ruin_seed: seed.derive("ruins"),
            landmarks: Arc::new(landmarks),
            fields,
            config: Arc::new(config),
        }
    }

    pub fn seed(&self) -> &WorldSeed {
        &self.config.seed
    }

    pub fn chunk_size(&self) -> i32 {
        self.config.chunk_size as i32
    }

    pub fn region_chunks(&self) -> i32 {
        self.config.region_chunks as i32
    }

    pub fn tile_size(&self) -> f64 {
        self.config.tile_size as f64
    }

    /// Spawn as a tile coordinate (configured, or derived when absent)
    pub fn spawn_tile(&self) -> (i32, i32) {
        self.landmarks.spawn.tile()
    }
}

//! World descriptor and generation parameters.
//!
//! A world is fully described by one [`WorldConfig`], loaded once at world start and
//! never mutated afterwards. Every magic number of the generator lives in
//! [`GenerationParams`] so tuning never means touching classifier code.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::seeds::{hash_bytes, WorldSeed};

/// The only descriptor version this crate understands.
pub const CONFIG_VERSION: u32 = 1;

/// Errors raised while loading or validating a world descriptor.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read world config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse world config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported config version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A position in world pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

/// Offset in tiles, relative to the spawn point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Finite world extent in tiles: `min` inclusive, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileBounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl TileBounds {
    pub fn contains(&self, tx: i32, ty: i32) -> bool {
        tx >= self.min_x && tx < self.max_x && ty >= self.min_y && ty < self.max_y
    }
}

/// Camera defaults handed through to the renderer
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraDefaults {
    pub zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            min_zoom: 0.5,
            max_zoom: 3.0,
        }
    }
}

/// World descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldConfig {
    /// Descriptor format version (must equal [`CONFIG_VERSION`]).
    pub version: u32,

    /// World seed: any string or integer.
    pub seed: WorldSeed,

    /// Tile edge length in world pixels.
    pub tile_size: u32,

    /// Chunk edge length in tiles.
    pub chunk_size: u32,

    /// Spawn point in world pixels. Landmarks are laid out around it when present.
    pub spawn: Option<PixelPos>,

    /// Region edge length in chunks (batching factor for bulk fetch/generation).
    pub region_chunks: u32,

    pub camera: CameraDefaults,

    /// Finite world extent; everything outside classifies as void.
    pub bounds: Option<TileBounds>,

    /// Maximum resident chunks in the cache.
    pub cache_capacity: usize,

    /// Extra tiles around the camera rectangle to keep loaded (prevents pop-in).
    pub view_margin_tiles: i32,

    /// Base URL for pre-generated regions served over HTTP.
    pub region_base_url: Option<String>,

    /// Local directory holding pre-generated regions.
    pub region_dir: Option<String>,

    pub generation: GenerationParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            seed: WorldSeed::default(),
            tile_size: 32,
            chunk_size: 32,
            spawn: None,
            region_chunks: 10,
            camera: CameraDefaults::default(),
            bounds: None,
            cache_capacity: 64,
            view_margin_tiles: 2,
            region_base_url: None,
            region_dir: None,
            generation: GenerationParams::default(),
        }
    }
}

impl WorldConfig {
    /// Default descriptor for a given seed
    pub fn with_seed(seed: WorldSeed) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON descriptor.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON descriptor from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Version {
                found: self.version,
                expected: CONFIG_VERSION,
            });
        }
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid("tileSize must be positive".into()));
        }
        if self.chunk_size == 0 || self.chunk_size > 1024 {
            return Err(ConfigError::Invalid(format!(
                "chunkSize must be in 1..=1024, got {}",
                self.chunk_size
            )));
        }
        if self.region_chunks == 0 {
            return Err(ConfigError::Invalid("regionChunks must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cacheCapacity must be positive".into()));
        }
        if self.view_margin_tiles < 0 {
            return Err(ConfigError::Invalid("viewMarginTiles must not be negative".into()));
        }
        let cam = &self.camera;
        if !(cam.min_zoom > 0.0 && cam.min_zoom <= cam.zoom && cam.zoom <= cam.max_zoom) {
            return Err(ConfigError::Invalid(format!(
                "camera zoom {} outside [{}, {}]",
                cam.zoom, cam.min_zoom, cam.max_zoom
            )));
        }
        if let Some(spawn) = self.spawn {
            if !spawn.x.is_finite() || !spawn.y.is_finite() {
                return Err(ConfigError::Invalid("spawn must be finite".into()));
            }
        }
        if let Some(b) = self.bounds {
            if b.min_x >= b.max_x || b.min_y >= b.max_y {
                return Err(ConfigError::Invalid("bounds must have positive extent".into()));
            }
        }
        self.generation.validate()
    }

    /// Configured spawn converted to a tile coordinate
    pub fn spawn_tile(&self) -> Option<(i32, i32)> {
        self.spawn.map(|p| {
            let ts = self.tile_size as f64;
            ((p.x / ts).floor() as i32, (p.y / ts).floor() as i32)
        })
    }

    /// Hex digest of everything that decides terrain: seed, chunk size, spawn tile,
    /// bounds and generation parameters. Two configs with equal fingerprints generate
    /// identical chunks.
    pub fn terrain_fingerprint(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(&(
            self.seed.text(),
            self.chunk_size,
            self.spawn_tile(),
            &self.bounds,
            &self.generation,
        ))?;
        Ok(format!("{:016x}", hash_bytes(json.as_bytes())))
    }
}

/// A disc-shaped landmark: offset from spawn plus radius in tiles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscParams {
    pub offset: Offset,
    pub radius: f64,
}

/// River geometry
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiverParams {
    /// River source relative to the mountain anchor
    pub source_offset: Offset,
    /// Tiles past either anchor where the band still applies
    pub margin: f64,
    /// Maximum lateral wobble in tiles
    pub wobble_amplitude: f64,
    /// Wavelength scale of the wobble noise in tiles
    pub wobble_scale: f64,
    pub half_width_min: f64,
    pub half_width_max: f64,
    pub width_scale: f64,
}

impl Default for RiverParams {
    fn default() -> Self {
        Self {
            source_offset: Offset::new(0, 80),
            margin: 8.0,
            wobble_amplitude: 8.0,
            wobble_scale: 48.0,
            half_width_min: 2.0,
            half_width_max: 4.0,
            width_scale: 32.0,
        }
    }
}

/// Biome decision thresholds. Falloffs are `exp(-d²/2r²)` in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BiomeThresholds {
    /// Falloff above which a landmark counts as influencing a tile
    pub min_influence: f64,
    pub mountain_height: f64,
    /// Height added at the mountain anchor
    pub mountain_boost: f64,
    /// Height removed at the swamp anchor
    pub swamp_sink: f64,
    pub desert_heat: f64,
    pub desert_moisture: f64,
    pub desert_heat_boost: f64,
    pub desert_drying: f64,
    pub forest_moisture: f64,
    pub forest_moisture_boost: f64,
    pub forest_height_min: f64,
    pub forest_height_max: f64,
    pub forest_heat_max: f64,
}

impl Default for BiomeThresholds {
    fn default() -> Self {
        Self {
            min_influence: 0.35,
            mountain_height: 0.78,
            mountain_boost: 0.65,
            swamp_sink: 0.35,
            desert_heat: 0.55,
            desert_moisture: 0.5,
            desert_heat_boost: 0.4,
            desert_drying: 0.4,
            forest_moisture: 0.45,
            forest_moisture_boost: 0.3,
            forest_height_min: 0.25,
            forest_height_max: 0.78,
            forest_heat_max: 0.75,
        }
    }
}

/// Decoration rarities (fraction of eligible tiles)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecorationParams {
    pub forest_trees: f64,
    pub forest_bushes: f64,
    pub meadow_trees: f64,
    pub meadow_flowers: f64,
    pub swamp_reeds: f64,
    pub desert_cacti: f64,
    pub desert_rocks: f64,
    pub mountain_rocks: f64,
    /// Chance that an 8x8 cell of meadow/desert hosts a ruin cluster
    pub ruin_cluster_chance: f64,
    /// Fraction of tiles inside a ruin cell that get rubble
    pub ruin_density: f64,
    /// Radii in tiles around the settlements kept free of props and details
    pub castle_clearing: f64,
    pub village_clearing: f64,
    pub town_clearing: f64,
}

impl Default for DecorationParams {
    fn default() -> Self {
        Self {
            forest_trees: 0.035,
            forest_bushes: 0.01,
            meadow_trees: 0.006,
            meadow_flowers: 0.025,
            swamp_reeds: 0.04,
            desert_cacti: 0.015,
            desert_rocks: 0.01,
            mountain_rocks: 0.02,
            ruin_cluster_chance: 0.01,
            ruin_density: 0.3,
            castle_clearing: 14.0,
            village_clearing: 12.0,
            town_clearing: 10.0,
        }
    }
}

/// Everything the generator needs besides seed and sizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationParams {
    /// Maximum per-axis landmark jitter in tiles
    pub landmark_jitter: i32,
    /// Spawn used when the descriptor has none (before jitter)
    pub default_origin: Offset,
    pub castle_offset: Offset,
    pub village_offset: Offset,
    pub town_offset: Offset,
    pub lake: DiscParams,
    pub mountain: DiscParams,
    pub desert: DiscParams,
    pub swamp: DiscParams,
    pub woods: DiscParams,
    pub noise_octaves: u32,
    pub height_scale: f64,
    pub moisture_scale: f64,
    pub heat_scale: f64,
    pub river: RiverParams,
    /// Tiles within this distance of a road segment are road
    pub road_half_width: f64,
    pub thresholds: BiomeThresholds,
    pub decorations: DecorationParams,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            landmark_jitter: 40,
            default_origin: Offset::new(2600, 1920),
            castle_offset: Offset::new(0, -20),
            village_offset: Offset::new(-300, -150),
            town_offset: Offset::new(350, 330),
            lake: DiscParams { offset: Offset::new(600, 700), radius: 180.0 },
            mountain: DiscParams { offset: Offset::new(-900, -400), radius: 400.0 },
            desert: DiscParams { offset: Offset::new(1000, -50), radius: 380.0 },
            swamp: DiscParams { offset: Offset::new(300, 1150), radius: 300.0 },
            woods: DiscParams { offset: Offset::new(-520, 120), radius: 300.0 },
            noise_octaves: crate::fields::DEFAULT_OCTAVES,
            height_scale: 128.0,
            moisture_scale: 160.0,
            heat_scale: 192.0,
            river: RiverParams::default(),
            road_half_width: 1.5,
            thresholds: BiomeThresholds::default(),
            decorations: DecorationParams::default(),
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.landmark_jitter < 0 {
            return Err(ConfigError::Invalid("landmarkJitter must not be negative".into()));
        }
        for (name, disc) in [
            ("lake", &self.lake),
            ("mountain", &self.mountain),
            ("desert", &self.desert),
            ("swamp", &self.swamp),
            ("woods", &self.woods),
        ] {
            if !(disc.radius > 0.0) {
                return Err(ConfigError::Invalid(format!("{} radius must be positive", name)));
            }
        }
        if self.noise_octaves == 0 {
            return Err(ConfigError::Invalid("noiseOctaves must be positive".into()));
        }
        let river = &self.river;
        for (name, v) in [
            ("heightScale", self.height_scale),
            ("moistureScale", self.moisture_scale),
            ("heatScale", self.heat_scale),
            ("river.wobbleScale", river.wobble_scale),
            ("river.widthScale", river.width_scale),
        ] {
            if !(v > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        if river.half_width_min <= 0.0 || river.half_width_min > river.half_width_max {
            return Err(ConfigError::Invalid("river half widths must satisfy 0 < min <= max".into()));
        }
        if river.wobble_amplitude < 0.0 || river.margin < 0.0 {
            return Err(ConfigError::Invalid("river wobble and margin must not be negative".into()));
        }
        if !(self.road_half_width > 0.0) {
            return Err(ConfigError::Invalid("roadHalfWidth must be positive".into()));
        }
        let d = &self.decorations;
        if [d.castle_clearing, d.village_clearing, d.town_clearing].iter().any(|r| !(*r >= 0.0)) {
            return Err(ConfigError::Invalid("settlement clearings must not be negative".into()));
        }
        Ok(())
    }
}

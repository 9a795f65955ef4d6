//! Chunk data: coordinates, named layers, and the JSON record format.
//!
//! A chunk is `size × size` tiles stored as one flat array per layer, row-major
//! (`i = ly * size + lx`), with [`EMPTY_TILE`] where a layer has nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::biomes::{Biome, PropKind};

/// Sentinel for "no tile on this layer"
pub const EMPTY_TILE: i32 = -1;

/// Longest run a single RLE pair may hold
pub const MAX_RUN: u32 = 65_535;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("layer {layer} has {found} tiles, expected {expected}")]
    LayerLength { layer: &'static str, found: usize, expected: usize },
    #[error("missing layer {0}")]
    MissingLayer(&'static str),
    #[error("unknown layer {0}")]
    UnknownLayer(String),
    #[error("layer {layer} holds invalid tile index {index}")]
    BadTile { layer: &'static str, index: i32 },
    #[error("bad run-length data in layer {layer}: {reason}")]
    Rle { layer: String, reason: String },
}

/// Tile coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile under a world-pixel position
    pub fn from_world(wx: f64, wy: f64, tile_size: f64) -> Self {
        Self::new((wx / tile_size).floor() as i32, (wy / tile_size).floor() as i32)
    }

    pub fn chunk(&self, chunk_size: i32) -> ChunkCoord {
        ChunkCoord::new(self.x.div_euclid(chunk_size), self.y.div_euclid(chunk_size))
    }

    /// Position inside the owning chunk
    pub fn local(&self, chunk_size: i32) -> (i32, i32) {
        (self.x.rem_euclid(chunk_size), self.y.rem_euclid(chunk_size))
    }
}

/// Chunk coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// First tile of the chunk
    pub fn origin(&self, chunk_size: i32) -> TileCoord {
        TileCoord::new(self.x * chunk_size, self.y * chunk_size)
    }

    pub fn region(&self, region_chunks: i32) -> RegionCoord {
        RegionCoord::new(self.x.div_euclid(region_chunks), self.y.div_euclid(region_chunks))
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chunk({}, {})", self.x, self.y)
    }
}

/// Region coordinate: an `N × N` block of chunks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionCoord {
    pub x: i32,
    pub y: i32,
}

impl RegionCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunks of this region in row-major order.
    pub fn chunks(&self, region_chunks: i32) -> impl Iterator<Item = ChunkCoord> {
        let (x0, y0) = (self.x * region_chunks, self.y * region_chunks);
        (0..region_chunks).flat_map(move |dy| (0..region_chunks).map(move |dx| ChunkCoord::new(x0 + dx, y0 + dy)))
    }

    /// File name used by baked regions
    pub fn file_name(&self) -> String {
        format!("region_{}_{}.json", self.x, self.y)
    }
}

impl std::fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "region({}, {})", self.x, self.y)
    }
}

/// The fixed set of chunk layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Ground,
    Water,
    Stone,
    Decorations,
    Objects,
    Shadows,
}

impl LayerKind {
    pub const ALL: [LayerKind; 6] = [
        LayerKind::Ground,
        LayerKind::Water,
        LayerKind::Stone,
        LayerKind::Decorations,
        LayerKind::Objects,
        LayerKind::Shadows,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Ground => "ground",
            LayerKind::Water => "ground_water",
            LayerKind::Stone => "ground_stone",
            LayerKind::Decorations => "decorations",
            LayerKind::Objects => "objects",
            LayerKind::Shadows => "shadows",
        }
    }

    /// Tileset the renderer draws this layer with
    pub fn tileset(&self) -> &'static str {
        match self {
            LayerKind::Ground => "grass",
            LayerKind::Water => "water1",
            LayerKind::Stone => "stone",
            LayerKind::Decorations | LayerKind::Objects => "plant",
            LayerKind::Shadows => "shadowPlant",
        }
    }

    pub fn from_name(name: &str) -> Option<LayerKind> {
        LayerKind::ALL.iter().copied().find(|l| l.name() == name)
    }
}

/// A y-sortable object on the objects layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prop {
    pub tile: TileCoord,
    pub kind: PropKind,
    pub frame: i32,
    pub shadow: Option<i32>,
}

/// One chunk of tile data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub size: i32,
    layers: [Vec<i32>; 6],
}

impl Chunk {
    /// A chunk with every layer empty
    pub fn empty(coord: ChunkCoord, size: i32) -> Self {
        let n = (size * size) as usize;
        Self {
            coord,
            size,
            layers: std::array::from_fn(|_| vec![EMPTY_TILE; n]),
        }
    }

    /// Plain meadow grass, nothing else. Stand-in for unusable chunk data.
    pub fn blank(coord: ChunkCoord, size: i32) -> Self {
        let mut chunk = Self::empty(coord, size);
        chunk.layers[LayerKind::Ground.index()].fill(Biome::Meadow.palette()[0]);
        chunk
    }

    pub fn tile_count(&self) -> usize {
        (self.size * self.size) as usize
    }

    pub fn layer(&self, kind: LayerKind) -> &[i32] {
        &self.layers[kind.index()]
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut [i32] {
        &mut self.layers[kind.index()]
    }

    fn idx(&self, lx: i32, ly: i32) -> usize {
        (ly * self.size + lx) as usize
    }

    /// Tile at local coordinates; `None` outside the chunk.
    pub fn get(&self, kind: LayerKind, lx: i32, ly: i32) -> Option<i32> {
        if lx < 0 || ly < 0 || lx >= self.size || ly >= self.size {
            return None;
        }
        self.layers[kind.index()].get(self.idx(lx, ly)).copied()
    }

    pub fn set(&mut self, kind: LayerKind, lx: i32, ly: i32, tile: i32) {
        let i = self.idx(lx, ly);
        self.layers[kind.index()][i] = tile;
    }

    /// Governing biome at a local coordinate: water layer, then stone, then ground.
    pub fn biome_at(&self, lx: i32, ly: i32) -> Biome {
        if self.get(LayerKind::Water, lx, ly).is_some_and(|t| t != EMPTY_TILE) {
            return Biome::Water;
        }
        if self.get(LayerKind::Stone, lx, ly).is_some_and(|t| t != EMPTY_TILE) {
            return Biome::Road;
        }
        self.get(LayerKind::Ground, lx, ly)
            .and_then(Biome::from_ground_tile)
            .unwrap_or(Biome::Meadow)
    }

    /// Check layer lengths and tile indices.
    pub fn validate(&self) -> Result<(), ChunkError> {
        let expected = self.tile_count();
        for kind in LayerKind::ALL {
            let layer = self.layer(kind);
            if layer.len() != expected {
                return Err(ChunkError::LayerLength { layer: kind.name(), found: layer.len(), expected });
            }
            if let Some(&index) = layer.iter().find(|&&t| t < EMPTY_TILE) {
                return Err(ChunkError::BadTile { layer: kind.name(), index });
            }
        }
        if let Some(&index) = self
            .layer(LayerKind::Ground)
            .iter()
            .find(|&&t| t != EMPTY_TILE && Biome::from_ground_tile(t).is_none())
        {
            return Err(ChunkError::BadTile { layer: LayerKind::Ground.name(), index });
        }
        Ok(())
    }

    /// Objects-layer props, sorted by tile y then x (renderer depth order).
    pub fn props(&self) -> Vec<Prop> {
        let origin = self.coord.origin(self.size);
        let objects = self.layer(LayerKind::Objects);
        let shadows = self.layer(LayerKind::Shadows);

        // Row-major scan already yields y-then-x order
        objects
            .iter()
            .enumerate()
            .filter(|(_, &frame)| frame != EMPTY_TILE)
            .filter_map(|(i, &frame)| {
                let kind = PropKind::from_frame(frame)?;
                let n = i as i32;
                Some(Prop {
                    tile: TileCoord::new(origin.x + n % self.size, origin.y + n / self.size),
                    kind,
                    frame,
                    shadow: Some(shadows[i]).filter(|&s| s != EMPTY_TILE),
                })
            })
            .collect()
    }

    pub fn to_record(&self, encoding: LayerEncoding) -> ChunkRecord {
        let layers = LayerKind::ALL
            .iter()
            .map(|&kind| {
                let tiles = self.layer(kind);
                let data = match encoding {
                    LayerEncoding::Plain => LayerData::Plain { data: tiles.to_vec() },
                    LayerEncoding::Rle => LayerData::Rle { rle: rle_encode(tiles) },
                };
                (kind.name().to_string(), LayerRecord { tileset: kind.tileset().to_string(), data })
            })
            .collect();

        ChunkRecord {
            cx: self.coord.x,
            cy: self.coord.y,
            layers,
        }
    }

    /// Rebuild a chunk from its record, validating every layer.
    pub fn from_record(record: &ChunkRecord, size: i32) -> Result<Chunk, ChunkError> {
        if let Some(name) = record.layers.keys().find(|n| LayerKind::from_name(n).is_none()) {
            return Err(ChunkError::UnknownLayer(name.clone()));
        }

        let mut chunk = Chunk::empty(ChunkCoord::new(record.cx, record.cy), size);
        for kind in LayerKind::ALL {
            let layer = record.layers.get(kind.name()).ok_or(ChunkError::MissingLayer(kind.name()))?;
            let tiles = match &layer.data {
                LayerData::Plain { data } => data.clone(),
                LayerData::Rle { rle } => rle_decode(kind.name(), rle)?,
            };
            chunk.layers[kind.index()] = tiles;
        }
        chunk.validate()?;
        Ok(chunk)
    }
}

/// How layer arrays are written out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayerEncoding {
    #[default]
    Plain,
    Rle,
}

/// Serialized chunk: `{cx, cy, layers: {name: {tileset, data | rle}}}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub cx: i32,
    pub cy: i32,
    pub layers: BTreeMap<String, LayerRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub tileset: String,
    #[serde(flatten)]
    pub data: LayerData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerData {
    Plain { data: Vec<i32> },
    Rle { rle: Vec<(u32, i32)> },
}

/// Run-length encode as `[count, value]` pairs, splitting runs longer than [`MAX_RUN`].
pub fn rle_encode(tiles: &[i32]) -> Vec<(u32, i32)> {
    let mut runs: Vec<(u32, i32)> = Vec::new();
    for &tile in tiles {
        match runs.last_mut() {
            Some((count, value)) if *value == tile && *count < MAX_RUN => *count += 1,
            _ => runs.push((1, tile)),
        }
    }
    runs
}

pub fn rle_decode(layer: &str, runs: &[(u32, i32)]) -> Result<Vec<i32>, ChunkError> {
    let mut tiles = Vec::new();
    for &(count, value) in runs {
        if count == 0 || count > MAX_RUN {
            return Err(ChunkError::Rle {
                layer: layer.to_string(),
                reason: format!("run length {} out of range", count),
            });
        }
        tiles.extend(std::iter::repeat(value).take(count as usize));
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::blank(ChunkCoord::new(-2, 3), 8);
        chunk.set(LayerKind::Water, 1, 1, 2);
        chunk.set(LayerKind::Ground, 1, 1, EMPTY_TILE);
        chunk.set(LayerKind::Stone, 4, 2, 0);
        chunk.set(LayerKind::Objects, 6, 5, 17);
        chunk.set(LayerKind::Shadows, 6, 5, 0);
        chunk.set(LayerKind::Objects, 2, 5, 34);
        chunk.set(LayerKind::Objects, 3, 0, 50);
        chunk
    }

    #[test]
    fn test_coordinate_conversions() {
        let tile = TileCoord::from_world(-1.0, 65.0, 32.0);
        assert_eq!(tile, TileCoord::new(-1, 2));
        assert_eq!(tile.chunk(32), ChunkCoord::new(-1, 0));
        assert_eq!(tile.local(32), (31, 2));

        let spawn = TileCoord::new(128, 85);
        assert_eq!(spawn.chunk(32), ChunkCoord::new(4, 2));
        assert_eq!(spawn.local(32), (0, 21));

        assert_eq!(ChunkCoord::new(-1, 9).region(10), RegionCoord::new(-1, 0));
        assert_eq!(RegionCoord::new(1, -1).chunks(2).collect::<Vec<_>>(), vec![
            ChunkCoord::new(2, -2),
            ChunkCoord::new(3, -2),
            ChunkCoord::new(2, -1),
            ChunkCoord::new(3, -1),
        ]);
    }

    #[test]
    fn test_layer_priority() {
        let chunk = sample_chunk();
        assert_eq!(chunk.biome_at(1, 1), Biome::Water);
        assert_eq!(chunk.biome_at(4, 2), Biome::Road);
        assert_eq!(chunk.biome_at(0, 0), Biome::Meadow);
    }

    #[test]
    fn test_props_sorted_by_y_then_x() {
        let props = sample_chunk().props();
        let tiles: Vec<_> = props.iter().map(|p| p.tile).collect();
        assert_eq!(tiles, vec![TileCoord::new(-13, 24), TileCoord::new(-14, 29), TileCoord::new(-10, 29)]);
        assert_eq!(props[0].kind, PropKind::Ruin);
        assert_eq!(props[2].kind, PropKind::Tree);
        assert_eq!(props[2].shadow, Some(0));
        assert_eq!(props[1].shadow, None);
    }

    #[test]
    fn test_records_in_both_encodings() {
        let chunk = sample_chunk();
        for encoding in [LayerEncoding::Plain, LayerEncoding::Rle] {
            let json = serde_json::to_string(&chunk.to_record(encoding)).unwrap();
            let record: ChunkRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(Chunk::from_record(&record, 8).unwrap(), chunk);
        }
    }

    #[test]
    fn test_record_json_shape() {
        let record = sample_chunk().to_record(LayerEncoding::Rle);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["cx"], -2);
        assert_eq!(value["layers"]["ground_water"]["tileset"], "water1");
        assert_eq!(value["layers"]["shadows"]["tileset"], "shadowPlant");
        assert!(value["layers"]["ground"]["rle"].is_array());
        assert!(value["layers"]["ground"].get("data").is_none());
    }

    #[test]
    fn test_rle_splits_long_runs() {
        let tiles = vec![7; MAX_RUN as usize + 10];
        let runs = rle_encode(&tiles);
        assert_eq!(runs, vec![(MAX_RUN, 7), (10, 7)]);
        assert_eq!(rle_decode("ground", &runs).unwrap(), tiles);
        assert!(rle_decode("ground", &[(0, 1)]).is_err());
    }

    #[test]
    fn test_rejects_malformed_records() {
        let mut record = sample_chunk().to_record(LayerEncoding::Plain);
        record.layers.get_mut("objects").unwrap().data = LayerData::Plain { data: vec![EMPTY_TILE; 10] };
        assert!(matches!(Chunk::from_record(&record, 8), Err(ChunkError::LayerLength { .. })));

        let mut record = sample_chunk().to_record(LayerEncoding::Plain);
        record.layers.remove("shadows");
        assert!(matches!(Chunk::from_record(&record, 8), Err(ChunkError::MissingLayer("shadows"))));

        let mut record = sample_chunk().to_record(LayerEncoding::Plain);
        record.layers.get_mut("ground").unwrap().data = LayerData::Plain { data: vec![4; 64] };
        assert!(matches!(Chunk::from_record(&record, 8), Err(ChunkError::BadTile { index: 4, .. })));
    }
}

//! Biome classification
//!
//! Every tile gets exactly one [`Biome`], decided in a fixed priority order:
//! void (outside finite bounds), water (lake or river), road, then the land biomes
//! mountain, desert, swamp, forest, falling back to meadow. The concrete tile index and
//! any decoration come from separately salted draws, so they can never flip the biome.

use serde::{Deserialize, Serialize};

use crate::chunk::LayerKind;
use crate::context::WorldContext;
use crate::landmarks::Point;
use crate::seeds::rand01;

/// Speed multiplier while wading through water
pub const WATER_SPEED: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    Water,
    Meadow,
    Forest,
    Mountain,
    Desert,
    Swamp,
    Road,
    Void,
}

const MEADOW_TILES: [i32; 4] = [0, 1, 2, 3];
const MOUNTAIN_TILES: [i32; 4] = [5, 6, 7, 8];
const FOREST_TILES: [i32; 4] = [9, 10, 11, 12];
const SWAMP_TILES: [i32; 4] = [13, 14, 15, 16];
const DESERT_TILES: [i32; 4] = [17, 18, 19, 20];
const VOID_TILES: [i32; 1] = [24];
const WATER_TILES: [i32; 4] = [0, 1, 2, 3];
const ROAD_TILES: [i32; 4] = [0, 1, 2, 3];

/// Cumulative weights for the four meadow grass variants
const MEADOW_WEIGHTS: [f64; 3] = [0.70, 0.88, 0.96];

impl Biome {
    pub const ALL: [Biome; 8] = [
        Biome::Water,
        Biome::Meadow,
        Biome::Forest,
        Biome::Mountain,
        Biome::Desert,
        Biome::Swamp,
        Biome::Road,
        Biome::Void,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Biome::Water => "water",
            Biome::Meadow => "meadow",
            Biome::Forest => "forest",
            Biome::Mountain => "mountain",
            Biome::Desert => "desert",
            Biome::Swamp => "swamp",
            Biome::Road => "road",
            Biome::Void => "void",
        }
    }

    /// Whether the tile blocks movement
    pub fn is_solid(&self) -> bool {
        matches!(self, Biome::Mountain | Biome::Void)
    }

    pub fn speed_multiplier(&self) -> f64 {
        match self {
            Biome::Water => WATER_SPEED,
            _ => 1.0,
        }
    }

    /// Map color (RGB), shared by the minimap and debug renders
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Biome::Water => (64, 112, 200),
            Biome::Meadow => (106, 170, 80),
            Biome::Forest => (34, 110, 50),
            Biome::Mountain => (128, 118, 110),
            Biome::Desert => (222, 200, 130),
            Biome::Swamp => (84, 104, 72),
            Biome::Road => (176, 150, 110),
            Biome::Void => (0, 0, 0),
        }
    }

    pub fn ascii_char(&self) -> char {
        match self {
            Biome::Water => '~',
            Biome::Meadow => '.',
            Biome::Forest => 'T',
            Biome::Mountain => '^',
            Biome::Desert => ':',
            Biome::Swamp => '%',
            Biome::Road => '=',
            Biome::Void => ' ',
        }
    }

    /// Layer this biome's tile is written to
    pub fn layer(&self) -> LayerKind {
        match self {
            Biome::Water => LayerKind::Water,
            Biome::Road => LayerKind::Stone,
            _ => LayerKind::Ground,
        }
    }

    /// Tile indices this biome picks from, within its layer's tileset.
    pub fn palette(&self) -> &'static [i32] {
        match self {
            Biome::Water => &WATER_TILES,
            Biome::Meadow => &MEADOW_TILES,
            Biome::Forest => &FOREST_TILES,
            Biome::Mountain => &MOUNTAIN_TILES,
            Biome::Desert => &DESERT_TILES,
            Biome::Swamp => &SWAMP_TILES,
            Biome::Road => &ROAD_TILES,
            Biome::Void => &VOID_TILES,
        }
    }

    /// Reverse lookup of a ground-layer tile index.
    pub fn from_ground_tile(index: i32) -> Option<Biome> {
        Biome::ALL
            .iter()
            .copied()
            .filter(|b| b.layer() == LayerKind::Ground)
            .find(|b| b.palette().contains(&index))
    }
}

impl std::fmt::Display for Biome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifier output for one tile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileClass {
    pub biome: Biome,
    /// Index within the tileset of `biome.layer()`
    pub tile_index: i32,
}

/// Classify one tile. Pure: depends only on the context and the coordinate.
pub fn classify(ctx: &WorldContext, tx: i32, ty: i32) -> TileClass {
    let biome = classify_biome(ctx, tx, ty);
    TileClass {
        biome,
        tile_index: pick_palette(ctx, biome, tx, ty),
    }
}

pub fn classify_biome(ctx: &WorldContext, tx: i32, ty: i32) -> Biome {
    if let Some(bounds) = ctx.config.bounds {
        if !bounds.contains(tx, ty) {
            return Biome::Void;
        }
    }

    let landmarks = &ctx.landmarks;
    if landmarks.is_water(tx, ty) {
        return Biome::Water;
    }
    // Roads never pave over water: tested after it
    if landmarks.on_road(tx, ty) {
        return Biome::Road;
    }

    classify_terrain(ctx, tx, ty)
}

/// Land biome ignoring water, roads and bounds. Also what lies under a road.
pub fn classify_terrain(ctx: &WorldContext, tx: i32, ty: i32) -> Biome {
    let t = &ctx.config.generation.thresholds;
    let lm = &ctx.landmarks;
    let c = ctx.fields.sample(tx, ty);

    let mountain = lm.mountain.falloff(tx, ty);
    let swamp = lm.swamp.falloff(tx, ty);
    let desert = lm.desert.falloff(tx, ty);
    let woods = lm.woods.falloff(tx, ty);

    let height = c.height + t.mountain_boost * mountain - t.swamp_sink * swamp;

    if mountain > t.min_influence && height > t.mountain_height {
        return Biome::Mountain;
    }

    if desert > t.min_influence
        && c.heat + t.desert_heat_boost * desert > t.desert_heat
        && c.moisture - t.desert_drying * desert < t.desert_moisture
    {
        return Biome::Desert;
    }

    if swamp > t.min_influence {
        return Biome::Swamp;
    }

    if woods > t.min_influence
        && c.moisture + t.forest_moisture_boost * woods > t.forest_moisture
        && height >= t.forest_height_min
        && height < t.forest_height_max
        && c.heat < t.forest_heat_max
    {
        return Biome::Forest;
    }

    Biome::Meadow
}

/// Pick the concrete tile for a biome from its palette.
pub fn pick_palette(ctx: &WorldContext, biome: Biome, tx: i32, ty: i32) -> i32 {
    let r = rand01(ctx.palette_seed, tx as i64, ty as i64);
    let palette = biome.palette();

    if biome == Biome::Meadow {
        let slot = MEADOW_WEIGHTS.iter().position(|&w| r < w).unwrap_or(MEADOW_WEIGHTS.len());
        return palette[slot];
    }
    pick(palette, r)
}

fn pick(frames: &[i32], r: f64) -> i32 {
    let i = ((r * frames.len() as f64) as usize).min(frames.len() - 1);
    frames[i]
}

/// Props are drawn on the objects layer, y-sorted, and cast a shadow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    Tree,
    Rock,
    Cactus,
    Ruin,
}

const TREE_FRAMES: [i32; 2] = [17, 18];
const ROCK_FRAMES: [i32; 1] = [34];
const CACTUS_FRAMES: [i32; 1] = [35];
const RUIN_FRAMES: [i32; 3] = [50, 51, 52];

const BUSH_FRAMES: [i32; 4] = [5, 6, 7, 8];
const FLOWER_FRAMES: [i32; 4] = [21, 22, 23, 24];
const REED_FRAMES: [i32; 2] = [25, 26];

/// Edge of the square cells ruin clusters are rolled for
const RUIN_CELL: i32 = 8;

impl PropKind {
    pub const ALL: [PropKind; 4] = [PropKind::Tree, PropKind::Rock, PropKind::Cactus, PropKind::Ruin];

    pub fn frames(&self) -> &'static [i32] {
        match self {
            PropKind::Tree => &TREE_FRAMES,
            PropKind::Rock => &ROCK_FRAMES,
            PropKind::Cactus => &CACTUS_FRAMES,
            PropKind::Ruin => &RUIN_FRAMES,
        }
    }

    /// Frame in the `shadowPlant` tileset
    pub fn shadow_frame(&self) -> i32 {
        match self {
            PropKind::Tree => 0,
            PropKind::Rock => 1,
            PropKind::Cactus => 2,
            PropKind::Ruin => 3,
        }
    }

    pub fn from_frame(frame: i32) -> Option<PropKind> {
        PropKind::ALL.iter().copied().find(|k| k.frames().contains(&frame))
    }
}

/// Decoration for one tile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decoration {
    /// Ground-level detail (flowers, bushes, reeds) on the decorations layer
    pub detail: Option<i32>,
    /// Object-layer prop and its frame
    pub prop: Option<(PropKind, i32)>,
}

impl Decoration {
    fn detail(frames: &[i32], v: f64) -> Self {
        Self { detail: Some(pick(frames, v)), prop: None }
    }

    fn prop(kind: PropKind, v: f64) -> Self {
        Self { detail: None, prop: Some((kind, pick(kind.frames(), v))) }
    }
}

/// Secondary pass: sparse decoration for land tiles.
///
/// Water, road and void tiles never get anything.
pub fn decorate(ctx: &WorldContext, biome: Biome, tx: i32, ty: i32) -> Decoration {
    let d = &ctx.config.generation.decorations;
    if in_settlement(ctx, tx, ty) {
        return Decoration::default();
    }
    let r = rand01(ctx.decor_seed, tx as i64, ty as i64);
    let v = rand01(ctx.variant_seed, tx as i64, ty as i64);

    if matches!(biome, Biome::Meadow | Biome::Desert) && in_ruin_cell(ctx, tx, ty) {
        return if r < d.ruin_density {
            Decoration::prop(PropKind::Ruin, v)
        } else {
            Decoration::default()
        };
    }

    match biome {
        Biome::Forest if r < d.forest_trees => Decoration::prop(PropKind::Tree, v),
        Biome::Forest if r < d.forest_trees + d.forest_bushes => Decoration::detail(&BUSH_FRAMES, v),
        Biome::Meadow if r < d.meadow_trees => Decoration::prop(PropKind::Tree, v),
        Biome::Meadow if r < d.meadow_trees + d.meadow_flowers => Decoration::detail(&FLOWER_FRAMES, v),
        Biome::Swamp if r < d.swamp_reeds => Decoration::detail(&REED_FRAMES, v),
        Biome::Desert if r < d.desert_cacti => Decoration::prop(PropKind::Cactus, v),
        Biome::Desert if r < d.desert_cacti + d.desert_rocks => Decoration::prop(PropKind::Rock, v),
        Biome::Mountain if r < d.mountain_rocks => Decoration::prop(PropKind::Rock, v),
        _ => Decoration::default(),
    }
}

/// Inside the cleared circle around the castle, village or town
fn in_settlement(ctx: &WorldContext, tx: i32, ty: i32) -> bool {
    let d = &ctx.config.generation.decorations;
    let lm = &ctx.landmarks;
    let p = Point::new(tx as f64, ty as f64);
    [(lm.castle, d.castle_clearing), (lm.village, d.village_clearing), (lm.town, d.town_clearing)]
        .iter()
        .any(|&(center, r)| p.distance(center) <= r)
}

fn in_ruin_cell(ctx: &WorldContext, tx: i32, ty: i32) -> bool {
    let cx = tx.div_euclid(RUIN_CELL) as i64;
    let cy = ty.div_euclid(RUIN_CELL) as i64;
    rand01(ctx.ruin_seed, cx, cy) < ctx.config.generation.decorations.ruin_cluster_chance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PixelPos, TileBounds, WorldConfig};
    use crate::seeds::WorldSeed;

    fn context() -> WorldContext {
        let mut config = WorldConfig::with_seed(WorldSeed::new("alttp-continent-001"));
        config.spawn = Some(PixelPos { x: 128.0 * 32.0, y: 85.0 * 32.0 });
        WorldContext::new(config).unwrap()
    }

    #[test]
    fn test_ground_palettes_are_disjoint() {
        for biome in Biome::ALL.iter().filter(|b| b.layer() == LayerKind::Ground) {
            for &tile in biome.palette() {
                assert_eq!(Biome::from_ground_tile(tile), Some(*biome));
            }
        }
        assert_eq!(Biome::from_ground_tile(4), None);
        assert_eq!(Biome::from_ground_tile(-1), None);
    }

    #[test]
    fn test_physics_table() {
        for biome in Biome::ALL {
            let speed = biome.speed_multiplier();
            assert!(speed.is_finite() && speed > 0.0 && speed <= 1.0);
        }
        assert!(!Biome::Water.is_solid());
        assert!(Biome::Water.speed_multiplier() < 1.0);
        assert!(Biome::Mountain.is_solid());
        assert!(Biome::Void.is_solid());
        assert!(!Biome::Road.is_solid());
        assert_eq!(Biome::Meadow.speed_multiplier(), 1.0);
    }

    #[test]
    fn test_lake_containment() {
        let ctx = context();
        let lake = ctx.landmarks.lake;
        let (cx, cy) = lake.center.tile();
        let r = lake.radius as i32;

        for dy in -r..=r {
            for dx in -r..=r {
                let d = ((dx * dx + dy * dy) as f64).sqrt();
                if d <= lake.radius - 1.0 {
                    assert_eq!(classify_biome(&ctx, cx + dx, cy + dy), Biome::Water, "({}, {}) inside lake", dx, dy);
                }
            }
        }

        // Ring just beyond the rim, on the side the river never reaches
        let (_, river_max_x) = ctx.landmarks.river.x_range();
        for step in 0..360 {
            let angle = (step as f64).to_radians();
            let reach = lake.radius + 6.0;
            let tx = (lake.center.x + reach * angle.cos()).round() as i32;
            let ty = (lake.center.y + reach * angle.sin()).round() as i32;
            if (tx as f64) <= river_max_x + 1.0 {
                continue;
            }
            assert_ne!(classify_biome(&ctx, tx, ty), Biome::Water, "({}, {}) outside lake", tx, ty);
        }
    }

    #[test]
    fn test_river_tiles_are_water() {
        let ctx = context();
        let river = &ctx.landmarks.river;
        let (min_x, max_x) = river.x_range();
        let mut x = min_x.ceil();
        while x <= max_x {
            let ty = river.center_y(x).round() as i32;
            assert_eq!(classify_biome(&ctx, x as i32, ty), Biome::Water);
            x += 7.0;
        }
    }

    #[test]
    fn test_roads_are_connected() {
        let ctx = context();
        for road in &ctx.landmarks.roads {
            let mut gap = 0;
            let mut max_gap = 0;
            for p in road.walk(1.0) {
                let (tx, ty) = p.tile();
                if classify_biome(&ctx, tx, ty) == Biome::Road {
                    gap = 0;
                } else {
                    gap += 1;
                    max_gap = max_gap.max(gap);
                }
            }
            assert!(max_gap <= 2, "road {} has a gap of {} tiles", road.name, max_gap);
        }
    }

    #[test]
    fn test_far_from_landmarks_is_meadow() {
        let ctx = context();
        let (sx, sy) = ctx.spawn_tile();
        for (dx, dy) in [(3000, 3000), (-3000, 3000), (3000, -3000), (-3000, -3000)] {
            let biome = classify_biome(&ctx, sx + dx, sy + dy);
            assert_eq!(biome, Biome::Meadow);
            assert_eq!(biome.speed_multiplier(), 1.0);
        }
    }

    #[test]
    fn test_palette_matches_biome() {
        let ctx = context();
        let (sx, sy) = ctx.spawn_tile();
        for ty in (sy - 600..sy + 1200).step_by(23) {
            for tx in (sx - 1000..sx + 1200).step_by(29) {
                let class = classify(&ctx, tx, ty);
                assert!(class.biome.palette().contains(&class.tile_index));
                assert_eq!(class, classify(&ctx, tx, ty));
            }
        }
    }

    #[test]
    fn test_landmark_biomes_appear() {
        let ctx = context();
        let lm = &ctx.landmarks;
        let share = |p: crate::landmarks::Point, biome: Biome| {
            let (cx, cy) = p.tile();
            let mut hits = 0;
            for y in cy - 10..=cy + 10 {
                for x in cx - 10..=cx + 10 {
                    if classify_terrain(&ctx, x, y) == biome {
                        hits += 1;
                    }
                }
            }
            hits as f64 / 441.0
        };
        assert_eq!(share(lm.swamp.center, Biome::Swamp), 1.0);
        assert!(share(lm.desert.center, Biome::Desert) > 0.5);
        assert!(share(lm.mountain.center, Biome::Mountain) > 0.5);
    }

    #[test]
    fn test_outside_bounds_is_void() {
        let mut config = WorldConfig::default();
        config.bounds = Some(TileBounds { min_x: 0, min_y: 0, max_x: 64, max_y: 64 });
        let ctx = WorldContext::new(config).unwrap();

        assert_eq!(classify(&ctx, -1, 10).biome, Biome::Void);
        assert_eq!(classify(&ctx, 64, 10).biome, Biome::Void);
        assert_eq!(classify(&ctx, -1, 10).tile_index, 24);
        assert_ne!(classify_biome(&ctx, 10, 10), Biome::Void);
    }

    #[test]
    fn test_decorations_are_sparse() {
        let ctx = context();
        let (wx, wy) = ctx.landmarks.woods.center.tile();

        let mut forest = 0;
        let mut decorated = 0;
        for ty in wy - 40..wy + 40 {
            for tx in wx - 40..wx + 40 {
                if classify_biome(&ctx, tx, ty) != Biome::Forest {
                    continue;
                }
                forest += 1;
                let deco = decorate(&ctx, Biome::Forest, tx, ty);
                if deco != Decoration::default() {
                    decorated += 1;
                }
            }
        }
        assert!(forest > 500, "only {} forest tiles around the woods", forest);
        let density = decorated as f64 / forest as f64;
        assert!(density > 0.0 && density < 0.08, "forest decoration density {}", density);
    }

    #[test]
    fn test_no_decoration_on_water_or_road() {
        let ctx = context();
        for tx in 0..200 {
            assert_eq!(decorate(&ctx, Biome::Water, tx, 3), Decoration::default());
            assert_eq!(decorate(&ctx, Biome::Road, tx, 3), Decoration::default());
        }
    }

    #[test]
    fn test_settlements_are_cleared() {
        let ctx = context();
        let lm = &ctx.landmarks;
        for (center, r) in [(lm.castle, 14), (lm.village, 12), (lm.town, 10)] {
            let (cx, cy) = center.tile();
            for ty in cy - r..=cy + r {
                for tx in cx - r..=cx + r {
                    if Point::new(tx as f64, ty as f64).distance(center) > r as f64 {
                        continue;
                    }
                    assert_eq!(decorate(&ctx, Biome::Forest, tx, ty), Decoration::default());
                    assert_eq!(decorate(&ctx, Biome::Meadow, tx, ty), Decoration::default());
                }
            }
        }

        // Without a clearing the same ground gets decorated
        let mut config = (*ctx.config).clone();
        config.generation.decorations.castle_clearing = 0.0;
        let open = WorldContext::new(config).unwrap();
        let (cx, cy) = open.landmarks.castle.tile();
        let decorated = (cy - 14..=cy + 14)
            .flat_map(|ty| (cx - 14..=cx + 14).map(move |tx| (tx, ty)))
            .filter(|&(tx, ty)| decorate(&open, Biome::Forest, tx, ty) != Decoration::default())
            .count();
        assert!(decorated > 0);
    }

    #[test]
    fn test_prop_frames_round_trip() {
        for kind in PropKind::ALL {
            for &frame in kind.frames() {
                assert_eq!(PropKind::from_frame(frame), Some(kind));
            }
        }
        assert_eq!(PropKind::from_frame(5), None);
    }
}

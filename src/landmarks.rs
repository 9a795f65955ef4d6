//! Landmark layout
//!
//! Anchors (spawn, castle, village, town), disc-shaped areas (lake, mountain, desert,
//! swamp, woods), the river running from the mountain foot into the lake, and the road
//! network. Derived once per seed and spawn, immutable afterwards.

use rand::Rng;

use crate::config::{DiscParams, GenerationParams, Offset};
use crate::fields::{lerp, ValueNoise};
use crate::seeds::WorldSeed;

/// A point in tile space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn from_tile(tx: i32, ty: i32) -> Self {
        Self::new(tx as f64, ty as f64)
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Nearest tile coordinate
    pub fn tile(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// A circular landmark area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disc {
    pub center: Point,
    pub radius: f64,
}

impl Disc {
    pub fn contains(&self, tx: i32, ty: i32) -> bool {
        self.center.distance(Point::from_tile(tx, ty)) < self.radius
    }

    /// Gaussian falloff `exp(-d²/2r²)`: 1 at the center, ~0.61 at the rim.
    pub fn falloff(&self, tx: i32, ty: i32) -> f64 {
        let dx = tx as f64 - self.center.x;
        let dy = ty as f64 - self.center.y;
        (-(dx * dx + dy * dy) / (2.0 * self.radius * self.radius)).exp()
    }
}

/// The river: a wobbling band between the mountain foot and the lake.
///
/// `center_y(tx)` interpolates linearly between source and mouth, plus a bounded
/// noise wobble. The band only exists for `tx` between the two ends, extended by `margin`.
#[derive(Clone, Debug)]
pub struct River {
    pub source: Point,
    pub mouth: Point,
    margin: f64,
    wobble: ValueNoise,
    wobble_amplitude: f64,
    width: ValueNoise,
    half_width_min: f64,
    half_width_max: f64,
}

impl River {
    /// Horizontal extent `[min, max]` where the band applies.
    pub fn x_range(&self) -> (f64, f64) {
        (
            self.source.x.min(self.mouth.x) - self.margin,
            self.source.x.max(self.mouth.x) + self.margin,
        )
    }

    fn run(&self) -> f64 {
        let dx = self.mouth.x - self.source.x;
        if dx.abs() < 1.0 {
            1.0f64.copysign(dx)
        } else {
            dx
        }
    }

    fn slope(&self) -> f64 {
        (self.mouth.y - self.source.y) / self.run()
    }

    /// River centerline at column `tx`.
    pub fn center_y(&self, tx: f64) -> f64 {
        let t = (tx - self.source.x) / self.run();
        let base = lerp(self.source.y, self.mouth.y, t);
        let wobble = (self.wobble.sample(tx, 0.0) * 2.0 - 1.0) * self.wobble_amplitude;
        base + wobble
    }

    /// Band half-width at column `tx`
    pub fn half_width(&self, tx: f64) -> f64 {
        lerp(self.half_width_min, self.half_width_max, self.width.sample(tx, 0.0))
    }

    pub fn contains(&self, tx: i32, ty: i32) -> bool {
        let x = tx as f64;
        let (min_x, max_x) = self.x_range();
        if x < min_x || x > max_x {
            return false;
        }
        (ty as f64 - self.center_y(x)).abs() < self.half_width(x)
    }

    /// Upper bound on `|center_y(x + 1) - center_y(x)|`.
    pub fn max_step(&self) -> f64 {
        self.slope().abs() + 2.0 * self.wobble_amplitude * self.wobble.max_slope() + 1e-9
    }
}

/// A straight road between two points
#[derive(Clone, Debug, PartialEq)]
pub struct RoadSegment {
    pub name: &'static str,
    pub a: Point,
    pub b: Point,
    pub half_width: f64,
}

impl RoadSegment {
    /// Distance from `p` to the closest point of the segment.
    pub fn distance_to(&self, p: Point) -> f64 {
        let dx = self.b.x - self.a.x;
        let dy = self.b.y - self.a.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return p.distance(self.a);
        }
        let t = (((p.x - self.a.x) * dx + (p.y - self.a.y) * dy) / len_sq).clamp(0.0, 1.0);
        p.distance(Point::new(self.a.x + t * dx, self.a.y + t * dy))
    }

    pub fn contains(&self, tx: i32, ty: i32) -> bool {
        self.distance_to(Point::from_tile(tx, ty)) <= self.half_width
    }

    pub fn length(&self) -> f64 {
        self.a.distance(self.b)
    }

    /// Points every `step` tiles from `a` to `b`, both ends included.
    pub fn walk(&self, step: f64) -> impl Iterator<Item = Point> + '_ {
        let steps = (self.length() / step).ceil().max(1.0) as usize;
        (0..=steps).map(move |i| {
            let t = i as f64 / steps as f64;
            Point::new(lerp(self.a.x, self.b.x, t), lerp(self.a.y, self.b.y, t))
        })
    }
}

/// Every landmark of one world
#[derive(Clone, Debug)]
pub struct LandmarkSet {
    pub spawn: Point,
    pub castle: Point,
    pub village: Point,
    pub town: Point,
    pub lake: Disc,
    pub mountain: Disc,
    pub desert: Disc,
    pub swamp: Disc,
    pub woods: Disc,
    pub river: River,
    pub roads: Vec<RoadSegment>,
}

impl LandmarkSet {
    /// Named anchor points, for logs and debug output.
    pub fn anchors(&self) -> Vec<(&'static str, Point)> {
        vec![
            ("spawn", self.spawn),
            ("castle", self.castle),
            ("village", self.village),
            ("town", self.town),
            ("lake", self.lake.center),
            ("mountain", self.mountain.center),
            ("desert", self.desert.center),
            ("swamp", self.swamp.center),
            ("woods", self.woods.center),
        ]
    }

    pub fn on_road(&self, tx: i32, ty: i32) -> bool {
        self.roads.iter().any(|r| r.contains(tx, ty))
    }

    pub fn is_water(&self, tx: i32, ty: i32) -> bool {
        self.lake.contains(tx, ty) || self.river.contains(tx, ty)
    }

    pub fn summary(&self) -> String {
        self.anchors()
            .iter()
            .map(|(name, p)| format!("{} ({:.0}, {:.0})", name, p.x, p.y))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Lay out all landmarks for a seed.
///
/// With a configured spawn tile every landmark sits at a fixed offset from it; without
/// one the spawn itself is the configured default origin plus jitter. Each anchor gets
/// its own jitter from the seed's `landmarks` stream, drawn in a fixed order.
pub fn derive_landmarks(seed: &WorldSeed, params: &GenerationParams, spawn_tile: Option<(i32, i32)>) -> LandmarkSet {
    let jitter = params.landmark_jitter;

    let (sx, sy) = match spawn_tile {
        Some(tile) => tile,
        None => {
            let mut rng = seed.stream("spawn");
            (
                params.default_origin.x + rng.gen_range(-jitter..=jitter),
                params.default_origin.y + rng.gen_range(-jitter..=jitter),
            )
        }
    };

    let mut rng = seed.stream("landmarks");
    let mut place = |offset: Offset| {
        let jx = rng.gen_range(-jitter..=jitter);
        let jy = rng.gen_range(-jitter..=jitter);
        Point::from_tile(sx + offset.x + jx, sy + offset.y + jy)
    };

    let castle = place(params.castle_offset);
    let village = place(params.village_offset);
    let town = place(params.town_offset);
    let mut disc = |d: &DiscParams| Disc { center: place(d.offset), radius: d.radius };
    let lake = disc(&params.lake);
    let mountain = disc(&params.mountain);
    let desert = disc(&params.desert);
    let swamp = disc(&params.swamp);
    let woods = disc(&params.woods);

    let rp = &params.river;
    let river = River {
        source: Point::new(
            mountain.center.x + rp.source_offset.x as f64,
            mountain.center.y + rp.source_offset.y as f64,
        ),
        mouth: lake.center,
        margin: rp.margin,
        wobble: ValueNoise::new(seed.derive("river-wobble"), rp.wobble_scale),
        wobble_amplitude: rp.wobble_amplitude,
        width: ValueNoise::new(seed.derive("river-width"), rp.width_scale),
        half_width_min: rp.half_width_min,
        half_width_max: rp.half_width_max,
    };

    let spawn = Point::from_tile(sx, sy);
    let road = |name, a, b| RoadSegment { name, a, b, half_width: params.road_half_width };
    let roads = vec![
        road("spawn-castle", spawn, castle),
        road("castle-village", castle, village),
        road("castle-town", castle, town),
        road("town-lake", town, shore_point(&lake, town)),
        road("castle-desert", castle, desert.center),
    ];

    LandmarkSet {
        spawn,
        castle,
        village,
        town,
        lake,
        mountain,
        desert,
        swamp,
        woods,
        river,
        roads,
    }
}

/// Point just outside the disc rim, facing `from`.
fn shore_point(disc: &Disc, from: Point) -> Point {
    let dx = from.x - disc.center.x;
    let dy = from.y - disc.center.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return from;
    }
    let reach = disc.radius + 2.0;
    Point::new(disc.center.x + dx / len * reach, disc.center.y + dy / len * reach)
}

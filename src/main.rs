use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use rune_world::chunk::LayerEncoding;
use rune_world::config::PixelPos;
use rune_world::export::{bake_regions, region_range, ExportError};
use rune_world::{RegionCoord, TileCoord, World, WorldConfig, WorldError, WorldSeed};

#[derive(Parser, Debug)]
#[command(name = "rune_world")]
#[command(about = "Deterministic procedural tile world generator")]
struct Args {
    /// World descriptor (JSON). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed override (any string or number)
    #[arg(short, long, global = true)]
    seed: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print landmarks and sample tile info
    Info,

    /// Pre-generate a rectangle of regions into a directory
    Bake {
        /// Output directory
        #[arg(short, long, default_value = "regions")]
        out: PathBuf,

        /// First region (x y)
        #[arg(long, num_args = 2, allow_negative_numbers = true, default_values_t = [0, 0])]
        from: Vec<i32>,

        /// Last region, inclusive (x y)
        #[arg(long, num_args = 2, allow_negative_numbers = true, default_values_t = [0, 0])]
        to: Vec<i32>,

        /// Run-length encode layers
        #[arg(long)]
        rle: bool,
    },

    /// Render a minimap PNG around a tile (spawn by default)
    Minimap {
        #[arg(short, long, default_value = "minimap.png")]
        out: PathBuf,

        /// Center tile (x y)
        #[arg(long, num_args = 2, allow_negative_numbers = true)]
        center: Option<Vec<i32>>,

        /// Tiles covered in each direction
        #[arg(short, long, default_value = "512")]
        radius: i32,

        /// Samples per side
        #[arg(long, default_value = "256")]
        resolution: usize,

        /// Pixels per sample
        #[arg(long, default_value = "2")]
        scale: u32,
    },

    /// Print an ASCII map around a tile (spawn by default)
    Ascii {
        /// Center tile (x y)
        #[arg(long, num_args = 2, allow_negative_numbers = true)]
        center: Option<Vec<i32>>,

        #[arg(short, long, default_value = "600")]
        radius: i32,

        /// Characters per side
        #[arg(long, default_value = "80")]
        resolution: usize,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), WorldError> {
    let mut config = match &args.config {
        Some(path) => WorldConfig::load(path)?,
        None => WorldConfig::default(),
    };
    if let Some(seed) = &args.seed {
        config.seed = WorldSeed::new(seed.as_str());
    }

    match args.command {
        Command::Info => {
            let mut world = World::new(config)?;
            print_info(&mut world);
        }
        Command::Bake { out, from, to, rle } => {
            let world = World::generated(config)?;
            let regions = region_range(RegionCoord::new(from[0], from[1]), RegionCoord::new(to[0], to[1]));
            let encoding = if rle { LayerEncoding::Rle } else { LayerEncoding::Plain };

            info!("Baking {} regions into {}", regions.len(), out.display());
            let manifest = bake_regions(world.context(), &regions, &out, encoding)?;
            println!(
                "Baked {} regions of {}x{} chunks (seed {}) into {}",
                manifest.regions.len(),
                manifest.region_chunks,
                manifest.region_chunks,
                manifest.seed,
                out.display()
            );
        }
        Command::Minimap { out, center, radius, resolution, scale } => {
            let world = World::generated(config)?;
            let center = center_position(&world, center.as_deref());
            let grid = world.sample_for_minimap(center, radius, resolution);
            grid.save_png(&out, scale)?;
            println!("Wrote {}x{} minimap to {}", grid.width, grid.height, out.display());
        }
        Command::Ascii { center, radius, resolution, out } => {
            let world = World::generated(config)?;
            let center = center_position(&world, center.as_deref());
            let grid = world.sample_for_minimap(center, radius, resolution);
            let text = grid.to_ascii();
            match out {
                Some(path) => {
                    fs::write(&path, text).map_err(ExportError::from)?;
                    println!("Wrote ASCII map to {}", path.display());
                }
                None => print!("{}", text),
            }
        }
    }

    Ok(())
}

/// World-pixel center for a `[x, y]` tile argument, or the spawn point
fn center_position(world: &World, tile: Option<&[i32]>) -> PixelPos {
    match tile {
        Some([x, y]) => {
            let ts = world.config().tile_size as f64;
            PixelPos {
                x: (*x as f64 + 0.5) * ts,
                y: (*y as f64 + 0.5) * ts,
            }
        }
        _ => world.spawn_position(),
    }
}

fn print_info(world: &mut World) {
    let config = world.config().clone();
    println!("Seed: {}", config.seed);
    println!(
        "Tiles: {}px | Chunks: {} tiles | Regions: {} chunks | Cache: {} chunks",
        config.tile_size, config.chunk_size, config.region_chunks, config.cache_capacity
    );

    let landmarks = world.landmarks().clone();
    println!();
    println!("Landmarks:");
    for (name, p) in landmarks.anchors() {
        println!("  {:10} ({:>6.0}, {:>6.0})", name, p.x, p.y);
    }
    for (name, disc) in [
        ("lake", landmarks.lake),
        ("mountain", landmarks.mountain),
        ("desert", landmarks.desert),
        ("swamp", landmarks.swamp),
        ("woods", landmarks.woods),
    ] {
        println!("  {:10} radius {:.0}", name, disc.radius);
    }
    let (min_x, max_x) = landmarks.river.x_range();
    println!("  river      x {:.0}..{:.0}", min_x, max_x);
    for road in &landmarks.roads {
        println!("  road       {} ({:.0} tiles)", road.name, road.length());
    }

    println!();
    println!("Sample tiles:");
    let samples = [
        ("spawn", landmarks.spawn.tile()),
        ("castle", landmarks.castle.tile()),
        ("lake", landmarks.lake.center.tile()),
        ("desert", landmarks.desert.center.tile()),
    ];
    if world.is_streaming() {
        for (_, (x, y)) in samples {
            world.tile_info_at_tile(TileCoord::new(x, y));
        }
        world.wait_for_fetches();
    }
    for (label, (x, y)) in samples {
        let info = world.tile_info_at_tile(TileCoord::new(x, y));
        println!(
            "  {:8} ({:>5}, {:>5}) {:10} solid={} speed={:.2}",
            label, x, y, info.name, info.solid, info.speed_multiplier
        );
    }

    println!();
    println!("{}", world.cache_stats().summary());
}

//! Debug script: biome census and ASCII map around spawn

use std::fs::File;
use std::io::{BufWriter, Write};

use rune_world::biomes::Biome;
use rune_world::{World, WorldConfig, WorldSeed};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let seed = std::env::args().nth(1).unwrap_or_else(|| "alttp-continent-001".to_string());
    let radius = 1200;
    let resolution = 160;

    let world = World::generated(WorldConfig::with_seed(WorldSeed::new(seed)))?;
    let grid = world.sample_for_minimap(world.spawn_position(), radius, resolution);

    let mut file = BufWriter::new(File::create("biome_debug.txt")?);

    writeln!(file, "=== BIOME DEBUG MAP ({}x{}) seed={} ===", resolution, resolution, world.config().seed)?;
    writeln!(file, "{} tiles per character, centered on spawn", grid.stride)?;
    writeln!(file)?;

    writeln!(file, "LEGEND:")?;
    for biome in Biome::ALL {
        writeln!(file, "  {} = {}", biome.ascii_char(), biome.name())?;
    }
    writeln!(file)?;

    write!(file, "{}", grid.to_ascii())?;
    writeln!(file)?;

    writeln!(file, "=== CENSUS ===")?;
    let census = grid.census();
    let total: usize = census.values().sum();
    for (biome, count) in &census {
        let pct = 100.0 * *count as f64 / total.max(1) as f64;
        writeln!(file, "  {:10} {} {:>6} ({:>5.1}%)", biome.name(), biome.ascii_char(), count, pct)?;
    }
    file.flush()?;

    println!("Wrote biome_debug.txt");
    for (biome, count) in &census {
        println!("  {:10} {:>6}", biome.name(), count);
    }
    Ok(())
}

//! # Worldweave Diagnostic Entry Point
//!
//! Generates one world from the built-in catalog and prints a summary per
//! region. Exits non-zero if generation fails, including when the
//! diagnostic attempt cap runs out.

use clap::Parser;
use std::process::ExitCode;
use worldweave::{
    GenerationConfig, JsonCatalog, WeaveError, WeaveResult, World, WorldGenerator, WorldRecord,
};

/// Command line arguments for the diagnostic generator.
#[derive(Parser, Debug)]
#[command(name = "worldweave")]
#[command(about = "Generates a key/lock gated overworld and its dungeons")]
#[command(version)]
struct Args {
    /// Random seed for world generation
    #[arg(short, long, default_value_t = 12345)]
    seed: u64,

    /// Give up after this many retries at any scope
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Use the small testing configuration
    #[arg(long)]
    small: bool,

    /// Catalog JSON file to use instead of the built-in data
    #[arg(long)]
    catalog: Option<std::path::PathBuf>,

    /// Print the save record as JSON after the summary
    #[arg(long)]
    dump_record: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    initialize_logging(&args.log_level);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ WeaveError::AttemptsExhausted { .. }) => {
            log::error!("{}", err);
            ExitCode::from(2)
        }
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging backend for the requested level.
fn initialize_logging(log_level: &str) {
    #[cfg(feature = "dev-tools")]
    {
        use tracing_subscriber::EnvFilter;

        let level = match log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => log_level.to_lowercase(),
            _ => "info".to_string(),
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(level))
            .with_target(false)
            .try_init();
    }

    #[cfg(not(feature = "dev-tools"))]
    {
        let level = log_level.parse().unwrap_or(log::LevelFilter::Info);
        let _ = env_logger::Builder::new().filter_level(level).try_init();
    }
}

async fn run(args: &Args) -> WeaveResult<()> {
    log::info!("Starting Worldweave v{}", worldweave::VERSION);

    let catalog = match &args.catalog {
        Some(path) => JsonCatalog::from_path(path)?,
        None => JsonCatalog::builtin()?,
    };
    let mut config = if args.small {
        GenerationConfig::for_testing(args.seed)
    } else {
        GenerationConfig::new(args.seed)
    };
    if args.max_attempts.is_some() {
        config.max_attempts = args.max_attempts;
    }

    let generator = WorldGenerator::new(&catalog, config)?;
    let world = generator.generate_world().await?;
    generator.validate(&world)?;

    print_summary(&world);
    if args.dump_record {
        println!("{}", WorldRecord::from_world(&world).to_json()?);
    }
    Ok(())
}

fn print_summary(world: &World) {
    println!("World seed {}", world.seed);
    println!(
        "{} region nodes, {} tiles, {} creatures, {} locks",
        world.overworld.len(),
        world.tile_count(),
        world.creature_count(),
        world.lock_ids.peek() - 1
    );
    for region in &world.overworld.regions {
        let nodes: Vec<_> = region
            .members
            .iter()
            .filter_map(|&pos| world.overworld.get(pos))
            .collect();
        let campfires = nodes.iter().filter(|n| n.has_campfire).count();
        let bosses = nodes.iter().filter(|n| n.has_boss).count();
        let levels = nodes.iter().map(|n| n.level);
        let (low, high) = (levels.clone().min().unwrap_or(0), levels.max().unwrap_or(0));
        let tiles: usize = region
            .members
            .iter()
            .filter_map(|&pos| world.dungeon(pos))
            .map(|d| d.tiles.len())
            .sum();
        let experience: u32 = region
            .members
            .iter()
            .filter_map(|&pos| world.dungeon(pos))
            .map(|d| d.total_experience)
            .sum();
        println!(
            "  region {} (tier {}): {} nodes, levels {}-{}, {} campfires, {} bosses, {} tiles, {} xp",
            region.index,
            region.tier,
            nodes.len(),
            low,
            high,
            campfires,
            bosses,
            tiles,
            experience
        );
        for node in nodes {
            println!(
                "    {:?} {:<10} level {:>2} dungeon levels {}{}{}",
                (node.position().x, node.position().y),
                node.biome.as_deref().unwrap_or("-"),
                node.level,
                node.num_security_levels,
                if node.is_start { " start" } else { "" },
                if node.is_offshoot { " offshoot" } else { "" },
            );
        }
    }
}

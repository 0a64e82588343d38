//! # SPAWNKEEP Server
//!
//! Headless tick loop around a simulated world.
//!
//! ```bash
//! spawnkeep_server [config.toml] [--ticks N] [--demo]
//! ```
//!
//! `--demo` registers a `wisp` spawner at the origin with a player next to
//! it when storage holds no spawners. On exit the spawner module saves and
//! drains storage.

use std::process;
use std::sync::Arc;

use spawnkeep::core::{SimWorld, TickScheduler};
use spawnkeep::shared::Location;
use spawnkeep::{logging, ModuleRegistry, ServerConfig, SpawnerModule, TickLoop, SPAWNER_MODULE};
use tracing::{error, info, warn};

/// Ticks run when `--ticks` is not given (one minute at 20 Hz).
const DEFAULT_TICK_BUDGET: u64 = 1200;

const DEMO_WORLD: &str = "world";

struct Args {
    config: Option<String>,
    ticks: u64,
    demo: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        ticks: DEFAULT_TICK_BUDGET,
        demo: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--ticks" => {
                let value = iter.next().ok_or("--ticks needs a value")?;
                args.ticks = value
                    .parse()
                    .map_err(|_| format!("--ticks expects a number, got {value:?}"))?;
            }
            "--demo" => args.demo = true,
            other if other.starts_with("--") => return Err(format!("unknown flag {other}")),
            path => args.config = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("usage: spawnkeep_server [config.toml] [--ticks N] [--demo]");
            process::exit(2);
        }
    };

    let config = match &args.config {
        Some(path) => match ServerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("FATAL: {e}");
                process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("FATAL: {e}");
        process::exit(1);
    }

    info!("SPAWNKEEP server v{}", env!("CARGO_PKG_VERSION"));
    let host = Arc::new(SimWorld::with_world(DEMO_WORLD));
    let scheduler = Arc::new(TickScheduler::new());
    let tick_rate = config.scheduler.tick_rate;

    let module = SpawnerModule::new(config, host.clone(), scheduler.clone());
    let service = Arc::clone(module.service());
    let mut modules = ModuleRegistry::new();
    if let Err(e) = modules.register(SPAWNER_MODULE, Box::new(module)) {
        error!("{e}");
        process::exit(1);
    }
    if modules.enable_all() == 0 {
        error!("No module could be enabled");
        process::exit(1);
    }

    if args.demo && service.list_spawners().is_empty() {
        let origin = Location::new(DEMO_WORLD, 0.0, 64.0, 0.0);
        host.add_player(Location::new(DEMO_WORLD, 4.0, 64.0, 4.0));
        match service.register_spawner("wisp", &origin, None) {
            Ok(id) => info!("Registered demo spawner {id}"),
            Err(e) => warn!("Could not register the demo spawner: {e}"),
        }
    }

    let mut tick_loop = TickLoop::new(tick_rate);
    info!("Running {} ticks at {tick_rate} Hz", args.ticks);
    tick_loop.run_for(&scheduler, args.ticks);

    let stats = tick_loop.stats();
    info!(
        "Done: {} ticks, {} tasks, {} late, avg {}us; {} spawners, {} entities",
        stats.total_ticks,
        stats.tasks_run,
        stats.late_ticks,
        stats.avg_tick_us,
        service.list_spawners().len(),
        service.registry().entity_count()
    );

    modules.disable_all();
}

use std::path::Path;

use cozmo::actuator::SimulatedActuator;
use cozmo::cli::{self, RunMode};
use cozmo::command::help_table;
use cozmo::config::{self, Config};
use cozmo::runner::Runner;

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("cozmo: {e}");
            eprintln!("{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    // ── Logging: RUST_LOG wins, otherwise info (debug with -v) ───────────────
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if args.help {
        println!("{}", cli::USAGE);
        println!();
        println!("Commands:");
        print!("{}", help_table());
        println!();
        println!("{}", cli::SCRIPT_HELP);
        if args.mode == RunMode::None {
            return;
        }
    }

    // ── Load user config ──────────────────────────────────────────────────────
    let config = match args.config.or_else(config::find_user_config) {
        Some(path) => load_config(&path),
        None => Config::default(),
    };

    let mut runner = Runner::new(config, SimulatedActuator::new());
    let result = match args.mode {
        RunMode::Script(path) => runner.load_and_run(&path).await,
        RunMode::Commands(lines) => runner.run_lines(&lines).await,
        RunMode::None => return,
    };

    if let Some(e) = &result.error {
        eprintln!("cozmo: {e}");
    }
    std::process::exit(result.exit_code);
}

/// Load an rc file; problems are warnings, never fatal.
fn load_config(path: &Path) -> Config {
    match Config::load_file(path) {
        Ok((config, errors)) => {
            for e in errors {
                log::warn!("{}: {e}", path.display());
            }
            config
        }
        Err(e) => {
            log::warn!("cannot read config {}: {e}", path.display());
            Config::default()
        }
    }
}

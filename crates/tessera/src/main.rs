//! Tessera CLI - tiled defect detection for large board images.
//!
//! Tessera cuts a large image into fixed-size tiles, sends each tile to a
//! detection server, and stitches the annotated tiles back into one image.
//!
//! # Usage
//!
//! ```bash
//! # Process a single image (writes board_result.png)
//! tessera detect board.jpg
//!
//! # Process a directory, writing results and a report elsewhere
//! tessera detect ./boards/ -o ./results/ --report results.jsonl
//!
//! # Inspect the tile grid without contacting the server
//! tessera plan board.jpg --tile-size 512
//!
//! # Check the detection server
//! tessera health
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Tessera - tiled defect detection for large board images.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Tile an image, run detection on every tile, and stitch the result
    Detect(cli::detect::DetectArgs),

    /// Print the tile grid for an image without contacting the server
    Plan(cli::plan::PlanArgs),

    /// Query the detection server's health endpoint
    Health(cli::health::HealthArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let loaded = match &cli.config {
        Some(path) => tessera_core::Config::load_from(path),
        None => tessera_core::Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e.into()),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `tessera config path`."
            );
            tessera_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Tessera v{}", tessera_core::VERSION);

    match cli.command {
        Commands::Detect(args) => cli::detect::execute(args, config).await,
        Commands::Plan(args) => cli::plan::execute(args, config).await,
        Commands::Health(args) => cli::health::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detect_with_global_flags() {
        let cli = Cli::try_parse_from([
            "tessera",
            "detect",
            "board.jpg",
            "--tile-size",
            "512",
            "--no-threshold",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Detect(args) => {
                assert_eq!(args.input, PathBuf::from("board.jpg"));
                assert_eq!(args.tile_size, Some(512));
                assert!(args.no_threshold);
                assert!(!args.skip_health_check);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn detect_requires_input() {
        assert!(Cli::try_parse_from(["tessera", "detect"]).is_err());
    }

    #[test]
    fn parses_config_init_force() {
        let cli = Cli::try_parse_from(["tessera", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(cli::config::ConfigArgs {
                command: cli::config::ConfigCommand::Init { force: true }
            })
        ));
    }
}

//! The `tessera plan` command: show the tile grid for an image.

use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tessera_core::pipeline::{ImageDecoder, Validator};
use tessera_core::{Anchor, Config, TileGrid};

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Source image
    #[arg(required = true)]
    pub input: PathBuf,

    /// Tile edge length in pixels (overrides config)
    #[arg(long)]
    pub tile_size: Option<u32>,
}

/// JSON shape printed by `tessera plan`.
#[derive(Debug, Serialize)]
struct PlanSummary {
    source: PathBuf,
    width: u32,
    height: u32,
    tile_size: u32,
    tile_count: usize,
    columns: Vec<u32>,
    rows: Vec<u32>,
    anchors: Vec<Anchor>,
}

impl PlanSummary {
    fn new(source: &Path, grid: &TileGrid) -> Self {
        Self {
            source: source.to_path_buf(),
            width: grid.width(),
            height: grid.height(),
            tile_size: grid.tile_size(),
            tile_count: grid.len(),
            columns: grid.columns().to_vec(),
            rows: grid.rows().to_vec(),
            anchors: grid.anchors().collect(),
        }
    }
}

/// Execute the plan command.
pub async fn execute(args: PlanArgs, config: Config) -> anyhow::Result<()> {
    let tile_size = args.tile_size.unwrap_or(config.tiling.tile_size);

    Validator::new(config.limits.clone()).validate(&args.input)?;
    let decoded = ImageDecoder::new(config.limits.clone())
        .decode(&args.input)
        .await?;

    let grid = TileGrid::plan(decoded.width, decoded.height, tile_size)?;
    tracing::debug!(
        "{:?}: {}x{} -> {} tiles",
        args.input,
        decoded.width,
        decoded.height,
        grid.len()
    );

    let summary = PlanSummary::new(&args.input, &grid);
    let json = if config.output.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{json}");
    Ok(())
}

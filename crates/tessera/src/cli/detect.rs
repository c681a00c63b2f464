//! The `tessera detect` command: tile, detect, stitch.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tessera_core::config::expand_path;
use tessera_core::pipeline::{result_path_for, FileDiscovery};
use tessera_core::{
    Config, HttpDetector, JobOptions, JobReport, OutputFormat, ReportWriter, TilePipeline,
};

/// Arguments for the `detect` command.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Image file or directory to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Result image (single input) or result directory (directory input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Tile edge length in pixels (overrides config)
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// Send tiles without Otsu binarization
    #[arg(long)]
    pub no_threshold: bool,

    /// Detection server base URL (overrides config)
    #[arg(long, env = "TESSERA_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Write the job report(s) here; `.jsonl` selects JSON Lines
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Start without querying the server's health endpoint
    #[arg(long)]
    pub skip_health_check: bool,
}

/// Execute the detect command.
pub async fn execute(mut args: DetectArgs, config: Config) -> anyhow::Result<()> {
    let config = apply_overrides(config, &args)?;
    args.output = args.output.as_deref().map(expand_path);
    args.report = args.report.as_deref().map(expand_path);

    let files = FileDiscovery::new(config.input.clone()).discover(&args.input);
    if files.is_empty() {
        tracing::warn!("No supported image files found at {:?}", args.input);
        return Ok(());
    }

    let detector = HttpDetector::new(&config.detector);
    if !args.skip_health_check {
        ensure_healthy(&detector, &config).await?;
    }

    let pipeline = TilePipeline::new(&config, Box::new(detector));
    let options = JobOptions::from(&config.tiling);

    if args.input.is_file() {
        let dest = args
            .output
            .clone()
            .unwrap_or_else(|| result_path_for(&args.input, None));
        let report = run_job(&pipeline, &args.input, &dest, &options).await?;
        if let Some(path) = &args.report {
            write_reports(path, &config, std::slice::from_ref(&report))?;
        }
        return Ok(());
    }

    process_directory(&pipeline, &args, &config, &options, files).await
}

/// Fold CLI flags into the loaded config.
fn apply_overrides(config: Config, args: &DetectArgs) -> anyhow::Result<Config> {
    let mut config = super::with_endpoint(config, args.endpoint.clone())?;
    if let Some(tile_size) = args.tile_size {
        config.tiling.tile_size = tile_size;
    }
    if args.no_threshold {
        config.tiling.apply_threshold = false;
    }
    config.validate()?;
    Ok(config)
}

async fn ensure_healthy(detector: &HttpDetector, config: &Config) -> anyhow::Result<()> {
    let status = detector.health().await.with_context(|| {
        format!(
            "Detection server at {} is unreachable (use --skip-health-check to bypass)",
            config.detector.endpoint
        )
    })?;
    if !status.is_healthy() {
        anyhow::bail!(
            "Detection server at {} is not ready (status \"{}\", model_loaded={})",
            config.detector.endpoint,
            status.status,
            status.model_loaded
        );
    }
    tracing::debug!("Detection server healthy at {}", config.health_url());
    Ok(())
}

/// Run one job with a progress bar and write its result image.
async fn run_job(
    pipeline: &TilePipeline,
    source: &Path,
    dest: &Path,
    options: &JobOptions,
) -> anyhow::Result<JobReport> {
    let pb = create_progress_bar(source);
    let mut rx = pipeline.subscribe();
    let bar = pb.clone();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            if status.progress.total > 0 {
                bar.set_length(status.progress.total as u64);
                bar.set_position(status.progress.completed as u64);
            }
            bar.set_message(status.message());
            if status.state.is_terminal() {
                break;
            }
        }
    });

    let outcome = pipeline.process_path(source, options).await;
    watcher.abort();
    let status = pipeline.status();

    let result = match outcome {
        Ok(result) => {
            pb.set_position(status.progress.completed as u64);
            pb.finish_with_message(status.message());
            result
        }
        Err(e) => {
            pb.abandon_with_message(status.message());
            return Err(e).with_context(|| format!("Failed to process {}", source.display()));
        }
    };

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &result.png)
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    tracing::info!(
        "Wrote {} ({} tiles, mean latency {:.0}ms)",
        dest.display(),
        result.report.tile_count(),
        result.report.mean_latency_ms()
    );
    Ok(result.report)
}

/// Process every discovered file in turn; failures are counted, not fatal.
async fn process_directory(
    pipeline: &TilePipeline,
    args: &DetectArgs,
    config: &Config,
    options: &JobOptions,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    tracing::info!("Found {} image(s) to process", files.len());
    let start = Instant::now();
    let mut reports = Vec::with_capacity(files.len());
    let mut failed = 0u64;

    for file in &files {
        let dest = result_path_for(file, args.output.as_deref());
        match run_job(pipeline, file, &dest, options).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::error!("{e:#}");
                failed += 1;
            }
        }
    }

    if let Some(path) = &args.report {
        write_reports(path, config, &reports)?;
    }

    let tiles: usize = reports.iter().map(|r| r.tile_count()).sum();
    print_summary(reports.len() as u64, failed, tiles, start.elapsed());

    if reports.is_empty() {
        anyhow::bail!("All {} image(s) failed", files.len());
    }
    Ok(())
}

/// Format follows the report path's extension, else `[output] report_format`.
fn report_format(path: &Path, config: &Config) -> OutputFormat {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputFormat::parse)
        .or_else(|| OutputFormat::parse(&config.output.report_format))
        .unwrap_or(OutputFormat::Json)
}

fn write_reports(path: &Path, config: &Config, reports: &[JobReport]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    let mut writer = ReportWriter::new(
        BufWriter::new(file),
        report_format(path, config),
        config.output.pretty,
    );

    match reports {
        [single] => writer.write(single)?,
        many => writer.write_all(many)?,
    }
    writer.flush()?;
    tracing::info!("Report written to {:?}", path);
    Ok(())
}

fn create_progress_bar(source: &Path) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_prefix(
        source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    pb.set_message("Preparing...");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Print a summary table after a directory run.
fn print_summary(succeeded: u64, failed: u64, tiles: usize, elapsed: Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        tiles as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Images:       {:>8}", succeeded + failed);
    eprintln!("    Tiles:        {:>8}", tiles);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} tiles/sec", rate);
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Anchor, TileRecord};

    fn args(input: &str) -> DetectArgs {
        DetectArgs {
            input: PathBuf::from(input),
            output: None,
            tile_size: None,
            no_threshold: false,
            endpoint: None,
            report: None,
            skip_health_check: false,
        }
    }

    fn report() -> JobReport {
        JobReport {
            source: Some(PathBuf::from("board.png")),
            content_hash: None,
            width: 640,
            height: 640,
            tile_size: 640,
            apply_threshold: true,
            columns: 1,
            rows: 1,
            tiles: vec![TileRecord {
                index: 0,
                anchor: Anchor::new(0, 0),
                threshold: Some(90),
                payload_bytes: 1000,
                latency_ms: 40,
            }],
            elapsed_ms: 55,
        }
    }

    #[test]
    fn overrides_fold_into_config() {
        let mut a = args("board.png");
        a.tile_size = Some(512);
        a.no_threshold = true;
        a.endpoint = Some("http://10.0.0.2:5000".to_string());

        let config = apply_overrides(Config::default(), &a).unwrap();
        assert_eq!(config.tiling.tile_size, 512);
        assert!(!config.tiling.apply_threshold);
        assert_eq!(config.detector.endpoint, "http://10.0.0.2:5000");
    }

    #[test]
    fn zero_tile_size_rejected() {
        let mut a = args("board.png");
        a.tile_size = Some(0);
        assert!(apply_overrides(Config::default(), &a).is_err());
    }

    #[test]
    fn report_format_from_extension() {
        let config = Config::default();
        assert_eq!(
            report_format(Path::new("out.jsonl"), &config),
            OutputFormat::JsonLines
        );
        assert_eq!(report_format(Path::new("out.json"), &config), OutputFormat::Json);

        let mut config = Config::default();
        config.output.report_format = "jsonl".to_string();
        assert_eq!(
            report_format(Path::new("report.txt"), &config),
            OutputFormat::JsonLines
        );
    }

    #[test]
    fn single_report_written_as_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_reports(&path, &Config::default(), &[report()]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["tile_size"], 640);
        assert_eq!(value["tiles"][0]["latency_ms"], 40);
    }

    #[test]
    fn batch_reports_written_as_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        write_reports(&path, &Config::default(), &[report(), report()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn empty_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path().to_str().unwrap());
        a.skip_health_check = true;
        execute(a, Config::default()).await.unwrap();
    }
}

//! The `tessera health` command.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tessera_core::{Config, HealthStatus, HttpDetector};

/// Arguments for the `health` command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Detection server base URL (overrides config)
    #[arg(long, env = "TESSERA_ENDPOINT")]
    pub endpoint: Option<String>,
}

#[derive(Serialize)]
struct HealthReport<'a> {
    endpoint: &'a str,
    healthy: bool,
    #[serde(flatten)]
    status: &'a HealthStatus,
}

/// Execute the health command.
pub async fn execute(args: HealthArgs, config: Config) -> anyhow::Result<()> {
    let config = super::with_endpoint(config, args.endpoint)?;
    let detector = HttpDetector::new(&config.detector);
    let url = config.health_url();

    let status = detector
        .health()
        .await
        .with_context(|| format!("Health check against {url} failed"))?;

    let report = HealthReport {
        endpoint: &config.detector.endpoint,
        healthy: status.is_healthy(),
        status: &status,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !status.is_healthy() {
        anyhow::bail!(
            "Detection server at {} is not ready (status \"{}\", model_loaded={})",
            config.detector.endpoint,
            status.status,
            status.model_loaded
        );
    }
    Ok(())
}

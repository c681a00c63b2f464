//! Command handlers.

pub mod config;
pub mod detect;
pub mod health;
pub mod plan;

use tessera_core::Config;

/// Apply a `--endpoint` override and re-check the result.
pub(crate) fn with_endpoint(mut config: Config, endpoint: Option<String>) -> anyhow::Result<Config> {
    if let Some(endpoint) = endpoint {
        config.detector.endpoint = endpoint;
    }
    config.validate()?;
    Ok(config)
}

use std::path::Path;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use shared::config::GatewayConfig;

const DEFAULT_CONFIG_NAME: &str = "gateway";
const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http_bind: String,
    pub log_level: String,
    pub gateway: GatewayConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_bind: "127.0.0.1:8470".into(),
            log_level: "info".into(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Defaults, then the config file, then `APP__*` environment variables
/// (`APP__GATEWAY__PANEL_HOST=...`).
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_from(path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

fn load_settings_from(path: Option<&Path>, env: Environment) -> anyhow::Result<Settings> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(env)
        .build()
        .context("failed to load configuration")?
        .try_deserialize()
        .context("configuration has invalid values")?;

    settings
        .gateway
        .validate()
        .context("invalid gateway configuration")?;
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;

//! Service configuration
//!
//! Defaults are overlaid with `PERF_*` environment variables (a `.env` file is
//! loaded first when present). `PORT` is also honoured for the listen port.

use serde::Deserialize;
use std::time::Duration;

const DEFAULT_YEARS: [&str; 5] = ["2021", "2022", "2023", "2024", "2025"];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub results_base_url: String,
    pub auth_base_url: String,
    pub strategy_id: String,
    pub supported_years: Vec<String>,
    pub request_timeout_secs: u64,
    pub port: u16,
}

impl Settings {
    /// Load from `.env`, then the process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let mut settings = Self::from_env(config::Environment::with_prefix("PERF"))?;
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            settings.port = port;
        }
        Ok(settings)
    }

    /// Build from defaults plus the given environment source
    pub fn from_env(env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("results_base_url", "http://localhost:3003")?
            .set_default("auth_base_url", "http://localhost:3003")?
            .set_default("strategy_id", crate::strategies::DEFAULT_STRATEGY)?
            .set_default("supported_years", DEFAULT_YEARS.to_vec())?
            .set_default("request_timeout_secs", 10_i64)?
            .set_default("port", 8080_i64)?
            .add_source(
                env.try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("supported_years"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

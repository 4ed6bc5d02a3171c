use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::orchestrator::DEFAULT_MAX_ITERATIONS;
use crate::pipeline::types::MAX_ITERATIONS_CEILING;

const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Default retry bound for every pipeline; requests may override it.
    pub max_iterations: u32,
    pub llm_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_iterations = parse_env("PIPELINE_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        if max_iterations > MAX_ITERATIONS_CEILING {
            anyhow::bail!(
                "PIPELINE_MAX_ITERATIONS must be at most {MAX_ITERATIONS_CEILING}, got {max_iterations}"
            );
        }

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_iterations,
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?),
        })
    }

    /// Retry bound for one request: the override if given, clamped to the ceiling.
    pub fn iterations_for(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.max_iterations)
            .min(MAX_ITERATIONS_CEILING)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

//! Application configuration
//!
//! Loaded from YAML (see [`crate::cli::runtime::load_config`]), then
//! overridden by environment variables and finally by command-line flags.

use std::time::Duration;

use action_flow::RunnerConfig;
use anyhow::{Context, Result};
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENV_DEBUGGER_URL: &str = "WIZARDFLOW_DEBUGGER_URL";
pub const ENV_STEP_TIMEOUT: &str = "WIZARDFLOW_STEP_TIMEOUT";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Remote-debugging endpoint of the running browser
    pub debugger_url: String,

    /// Attach to the first page whose URL contains this text
    pub page_url_contains: Option<String>,

    pub connect_timeout_ms: u64,

    /// Readiness bound per wizard step
    pub step_timeout_ms: u64,

    pub poll_interval_ms: u64,

    /// Overrides the workflow's own recovery bound when set
    pub recovery_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debugger_url: "http://127.0.0.1:9211".to_string(),
            page_url_contains: None,
            connect_timeout_ms: 10_000,
            step_timeout_ms: 25_000,
            poll_interval_ms: 250,
            recovery_timeout_ms: None,
        }
    }
}

impl Config {
    /// Apply `WIZARDFLOW_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DEBUGGER_URL).filter(|v| !v.trim().is_empty()) {
            info!("Using debugger URL from {}", ENV_DEBUGGER_URL);
            self.debugger_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_STEP_TIMEOUT).filter(|v| !v.trim().is_empty()) {
            let timeout = parse_duration(&raw)
                .with_context(|| format!("Invalid {} value '{}'", ENV_STEP_TIMEOUT, raw))?;
            self.step_timeout_ms = timeout.as_millis() as u64;
        }
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            step_timeout_ms: self.step_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    pub fn cdp_config(&self) -> CdpConfig {
        CdpConfig {
            debugger_url: self.debugger_url.clone(),
            page_url_contains: self.page_url_contains.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            ..CdpConfig::default()
        }
    }
}

/// Parse a human duration such as `25s` or `1m 30s`
pub fn parse_duration(raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim()).map_err(Into::into)
}

use std::path::PathBuf;
use std::time::Duration;

use crate::chart::Layout;
use crate::device::retry::RetryConfig;

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the controller, e.g. `http://192.168.4.1`
    pub base_url: String,
    pub poll_secs: u64,
    pub http_timeout_ms: u64,
    pub retries: u32,
    pub retry_base_ms: u64,
    pub chart_layout: Layout,
    /// When set, watch mode rewrites this SVG after every cycle
    pub chart_svg: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let num = |key: &str, default: u64| -> u64 {
            get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };
        Self {
            base_url: get("TERRARIO_URL").unwrap_or_else(|| "http://192.168.4.1".to_string()),
            poll_secs: num("POLL_SECS", 60).max(1),
            http_timeout_ms: num("HTTP_TIMEOUT_MS", 5000),
            retries: get("RETRIES").and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0),
            retry_base_ms: num("RETRY_BASE_MS", 200),
            chart_layout: get("CHART_LAYOUT")
                .and_then(|v| Layout::parse(&v))
                .unwrap_or_default(),
            chart_svg: get("CHART_SVG").filter(|v| !v.is_empty()).map(PathBuf::from),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retries,
            base_delay_ms: self.retry_base_ms,
            ..RetryConfig::default()
        }
    }
}

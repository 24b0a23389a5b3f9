use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{DeviceState, NetStatus, Reading};

mod http;
pub mod retry;

pub use http::HttpDevice;

/// Paths served by the controller firmware.
pub mod endpoint {
    pub const STATE: &str = "/api/state";
    pub const TODAY: &str = "/api/today";
    pub const NET_STATUS: &str = "/api/netstatus";
    pub const SETPOINT: &str = "/api/setpoint";
    pub const WIFI: &str = "/api/wifi";
    pub const NTP_SYNC: &str = "/api/ntpsync";
}

/// Non-2xx answer from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub endpoint: String,
    pub status: u16,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} answered HTTP {}", self.endpoint, self.status)
    }
}

impl std::error::Error for StatusError {}

/// The controller's HTTP surface.
#[async_trait]
pub trait Device: Send + Sync {
    async fn fetch_state(&self) -> Result<DeviceState>;
    async fn fetch_today(&self) -> Result<Vec<Reading>>;
    async fn fetch_net_status(&self) -> Result<NetStatus>;
    async fn submit_setpoint(&self, value: f64) -> Result<()>;
    async fn submit_wifi(&self, ssid: &str, password: &str) -> Result<()>;
    async fn request_time_sync(&self) -> Result<()>;
}

/// Setpoint as the form sends it: one decimal.
pub fn setpoint_field(value: f64) -> String {
    format!("{:.1}", value)
}

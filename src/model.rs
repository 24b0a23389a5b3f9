//! Records returned by the controller's HTTP API.
//!
//! The firmware serializes a failed sensor read as `null` (or, on some builds,
//! as the string `"nan"`), so every measurement decodes into `Option<f64>`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Date the firmware reports while its clock has never been set.
pub const UNSET_DATE: &str = "0000-00-00";

/// GET /api/state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub umid: Option<f64>,
    /// Target temperature
    #[serde(default, deserialize_with = "lenient_f64")]
    pub alvo: Option<f64>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub lampada: bool,
}

/// One element of GET /api/today
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hora: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub umid: Option<f64>,
}

impl Reading {
    /// Date of the sample, `None` when absent or the unset-clock sentinel.
    pub fn date(&self) -> Option<&str> {
        self.data
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty() && *d != UNSET_DATE)
    }

    /// Minutes since midnight parsed from `HH:MM`.
    pub fn minute_of_day(&self) -> Option<u32> {
        let mut parts = self.hora.trim().splitn(3, ':');
        let h: u32 = parts.next()?.trim().parse().ok()?;
        let m: u32 = parts.next()?.trim().parse().ok()?;
        if h > 23 || m > 59 {
            return None;
        }
        Some(h * 60 + m)
    }
}

/// GET /api/netstatus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetStatus {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub sta_connected: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub sta_configured: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub time_valid: bool,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub ssid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Connecting,
    Disconnected,
}

impl NetStatus {
    pub fn link(&self) -> LinkState {
        if self.sta_connected {
            LinkState::Connected
        } else if self.sta_configured {
            LinkState::Connecting
        } else {
            LinkState::Disconnected
        }
    }

    /// Device wall-clock time, only when the device reports it as synced.
    pub fn clock(&self) -> Option<&str> {
        if !self.time_valid {
            return None;
        }
        self.datetime.as_deref().filter(|d| !d.is_empty())
    }

    pub fn configured_ssid(&self) -> Option<&str> {
        self.ssid.as_deref().filter(|s| !s.is_empty())
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(measure_from_value))
}

fn measure_from_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "on"),
        _ => false,
    })
}

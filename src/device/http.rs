use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use super::retry::{retry_async, RetryConfig};
use super::{endpoint, setpoint_field, Device, StatusError};
use crate::config::Config;
use crate::logging::{log_submit, v_str};
use crate::model::{DeviceState, NetStatus, Reading};

/// [`Device`] over the controller's REST API.
pub struct HttpDevice {
    client: Client,
    base: Url,
    retry: RetryConfig,
}

impl HttpDevice {
    pub fn new(cfg: &Config) -> Result<Self> {
        let base = parse_base(&cfg.base_url)?;
        let client = Client::builder()
            .timeout(cfg.http_timeout())
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, base, retry: cfg.retry() })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid endpoint {}", path))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T> {
        let url = self.url(path)?;
        retry_async(&self.retry, path, || {
            let req = self.client.get(url.clone());
            async move {
                let resp = check(path, req.send().await?)?;
                let body = resp.bytes().await?;
                Ok::<T, anyhow::Error>(serde_json::from_slice::<T>(&body)?)
            }
        })
        .await
        .with_context(|| format!("GET {}", path))
    }

    async fn post_form(&self, path: &'static str, form: &[(&str, &str)]) -> Result<()> {
        let url = self.url(path)?;
        let resp = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .with_context(|| format!("POST {}", path))?;
        check(path, resp)?;
        Ok(())
    }
}

/// Accepts `host`, `host:port` or a full URL. The path is treated as a
/// directory so endpoint paths join beneath it.
fn parse_base(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(anyhow!("device URL is empty"));
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let mut url = Url::parse(&with_scheme).with_context(|| format!("invalid device URL {}", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("unsupported scheme {} in device URL", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn check(path: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(anyhow!(StatusError { endpoint: path.to_string(), status: status.as_u16() }))
    }
}

#[async_trait]
impl Device for HttpDevice {
    async fn fetch_state(&self) -> Result<DeviceState> {
        self.get_json(endpoint::STATE).await
    }

    async fn fetch_today(&self) -> Result<Vec<Reading>> {
        self.get_json(endpoint::TODAY).await
    }

    async fn fetch_net_status(&self) -> Result<NetStatus> {
        self.get_json(endpoint::NET_STATUS).await
    }

    async fn submit_setpoint(&self, value: f64) -> Result<()> {
        let valor = setpoint_field(value);
        log_submit(endpoint::SETPOINT, &[("valor", v_str(&valor))]);
        self.post_form(endpoint::SETPOINT, &[("valor", valor.as_str())]).await
    }

    async fn submit_wifi(&self, ssid: &str, password: &str) -> Result<()> {
        log_submit(endpoint::WIFI, &[("ssid", v_str(ssid)), ("senha", v_str(password))]);
        self.post_form(endpoint::WIFI, &[("ssid", ssid), ("senha", password)]).await
    }

    async fn request_time_sync(&self) -> Result<()> {
        log_submit(endpoint::NTP_SYNC, &[]);
        let url = self.url(endpoint::NTP_SYNC)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {}", endpoint::NTP_SYNC))?;
        check(endpoint::NTP_SYNC, resp)?;
        Ok(())
    }
}

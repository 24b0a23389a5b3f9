//! Poll cycle and control operations over a [`Device`].

use std::future::Future;
use std::time::Instant;

use anyhow::{anyhow, Result};
use serde_json::json;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::chart::{render_svg, Chart, Layout};
use crate::device::{endpoint, Device};
use crate::logging::{log, log_fetch_failed, log_poll_summary, obj, v_num, v_str, Domain, Level};
use crate::model::{DeviceState, NetStatus, Reading};
use crate::view;

/// Floor for the watch period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Everything one poll cycle managed to fetch. A failed fetch leaves its
/// section empty; the others still render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub state: Option<DeviceState>,
    pub today: Option<Vec<Reading>>,
    pub net: Option<NetStatus>,
}

impl Snapshot {
    pub fn readings(&self) -> &[Reading] {
        self.today.as_deref().unwrap_or(&[])
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("== Terrarium ==\n");
        match &self.state {
            Some(state) => out.push_str(&view::render_state(state)),
            None => out.push_str("(state unavailable)\n"),
        }
        out.push_str("\n== Network ==\n");
        match &self.net {
            Some(net) => out.push_str(&view::render_net_status(net)),
            None => out.push_str("(network status unavailable)\n"),
        }
        out.push_str("\n== Today ==\n");
        match &self.today {
            Some(readings) => out.push_str(&view::render_table(readings)),
            None => out.push_str("(readings unavailable)\n"),
        }
        out
    }

    pub fn chart(&self, layout: Layout) -> Chart {
        Chart::build(layout, self.readings())
    }
}

/// User-facing outcome of a control operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub ok: bool,
    pub message: String,
    /// Section re-fetched after a successful submit, already rendered
    pub refreshed: Option<String>,
}

impl Notice {
    fn success(message: &str, refreshed: Option<String>) -> Self {
        Self { ok: true, message: message.to_string(), refreshed }
    }

    fn failure(message: &str) -> Self {
        Self { ok: false, message: message.to_string(), refreshed: None }
    }
}

pub struct Dashboard<D> {
    device: D,
    layout: Layout,
}

impl<D: Device> Dashboard<D> {
    pub fn new(device: D, layout: Layout) -> Self {
        Self { device, layout }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub async fn refresh_state(&self) -> Option<DeviceState> {
        logged(endpoint::STATE, self.device.fetch_state()).await
    }

    pub async fn refresh_today(&self) -> Option<Vec<Reading>> {
        logged(endpoint::TODAY, self.device.fetch_today()).await
    }

    pub async fn refresh_net_status(&self) -> Option<NetStatus> {
        logged(endpoint::NET_STATUS, self.device.fetch_net_status()).await
    }

    /// One full cycle: state, today's readings, then network status.
    pub async fn poll(&self) -> Snapshot {
        let started = Instant::now();
        let state = self.refresh_state().await;
        let today = self.refresh_today().await;
        let net = self.refresh_net_status().await;
        log_poll_summary(
            today.as_ref().map(Vec::len).unwrap_or(0),
            state.is_some(),
            net.is_some(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        Snapshot { state, today, net }
    }

    /// Poll now and then every `period` until Ctrl-C, or until `cycles`
    /// snapshots have been delivered. A slow cycle delays the next tick
    /// instead of overlapping it.
    pub async fn run<F>(&self, period: Duration, cycles: Option<u64>, on_snapshot: F) -> u64
    where
        F: FnMut(&Snapshot) -> Result<()>,
    {
        self.run_until(period, cycles, tokio::signal::ctrl_c(), on_snapshot).await
    }

    /// Same as [`Dashboard::run`], stopping when `shutdown` resolves. The
    /// shutdown future is polled during the wait and during the poll itself,
    /// so a cycle in flight is abandoned. A failing `on_snapshot` is logged
    /// and the loop continues.
    pub async fn run_until<F, S>(&self, period: Duration, cycles: Option<u64>, shutdown: S, mut on_snapshot: F) -> u64
    where
        F: FnMut(&Snapshot) -> Result<()>,
        S: Future,
    {
        let period = period.max(MIN_PERIOD);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut done = 0u64;
        log(
            Level::Info,
            Domain::System,
            "watch_start",
            obj(&[("period_secs", v_num(period.as_secs_f64())), ("layout", v_str(&format!("{:?}", self.layout)))]),
        );
        loop {
            if cycles.is_some_and(|max| done >= max) {
                break;
            }
            let snapshot = tokio::select! {
                snapshot = async {
                    ticker.tick().await;
                    self.poll().await
                } => snapshot,
                _ = &mut shutdown => {
                    log(Level::Info, Domain::System, "watch_interrupted", obj(&[("cycles", json!(done))]));
                    break;
                }
            };
            if let Err(err) = on_snapshot(&snapshot) {
                log(
                    Level::Error,
                    Domain::Render,
                    "snapshot_output_failed",
                    obj(&[("cycle", json!(done)), ("error", v_str(&format!("{:#}", err)))]),
                );
            }
            done += 1;
        }
        done
    }

    pub fn render_chart(&self, snapshot: &Snapshot) -> String {
        let chart = snapshot.chart(self.layout);
        log(
            Level::Debug,
            Domain::Render,
            "chart",
            obj(&[
                ("temp_points", json!(chart.temp.points.len())),
                ("umid_points", json!(chart.umid.points.len())),
            ]),
        );
        render_svg(&chart)
    }

    pub async fn update_setpoint(&self, value: f64) -> Notice {
        const FAILED: &str = "Failed to update setpoint.";
        if !value.is_finite() {
            log_control_failure(endpoint::SETPOINT, &anyhow!("setpoint {} is not a number", value));
            return Notice::failure(FAILED);
        }
        match self.device.submit_setpoint(value).await {
            Ok(()) => {
                let state = self.refresh_state().await;
                Notice::success("Setpoint updated.", state.as_ref().map(view::render_state))
            }
            Err(err) => {
                log_control_failure(endpoint::SETPOINT, &err);
                Notice::failure(FAILED)
            }
        }
    }

    pub async fn configure_wifi(&self, ssid: &str, password: &str) -> Notice {
        const FAILED: &str = "Failed to send Wi-Fi configuration.";
        if ssid.trim().is_empty() {
            log_control_failure(endpoint::WIFI, &anyhow!("empty SSID"));
            return Notice::failure(FAILED);
        }
        match self.device.submit_wifi(ssid, password).await {
            Ok(()) => {
                let net = self.refresh_net_status().await;
                Notice::success(
                    "Wi-Fi configuration sent. The device will try to connect.",
                    net.as_ref().map(view::render_net_status),
                )
            }
            Err(err) => {
                log_control_failure(endpoint::WIFI, &err);
                Notice::failure(FAILED)
            }
        }
    }

    pub async fn sync_time(&self) -> Notice {
        match self.device.request_time_sync().await {
            Ok(()) => {
                let net = self.refresh_net_status().await;
                Notice::success("Time sync requested.", net.as_ref().map(view::render_net_status))
            }
            Err(err) => {
                log_control_failure(endpoint::NTP_SYNC, &err);
                Notice::failure("Failed to request time sync.")
            }
        }
    }
}

async fn logged<T, Fut>(path: &str, fetch: Fut) -> Option<T>
where
    Fut: Future<Output = Result<T>>,
{
    match fetch.await {
        Ok(value) => Some(value),
        Err(err) => {
            log_fetch_failed(path, &err);
            None
        }
    }
}

fn log_control_failure(path: &str, err: &anyhow::Error) {
    log(
        Level::Error,
        Domain::Control,
        "submit_failed",
        obj(&[("endpoint", v_str(path)), ("error", v_str(&format!("{:#}", err)))]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDevice {
        state: Option<DeviceState>,
        today: Option<Vec<Reading>>,
        net: Option<NetStatus>,
        reject_submits: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDevice {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn answer<T: Clone>(&self, call: &str, value: &Option<T>) -> Result<T> {
            self.record(call.to_string());
            value.clone().ok_or_else(|| anyhow!("{} offline", call))
        }

        fn submit(&self, call: String) -> Result<()> {
            self.record(call);
            if self.reject_submits {
                Err(anyhow!("rejected"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Device for FakeDevice {
        async fn fetch_state(&self) -> Result<DeviceState> {
            self.answer("state", &self.state)
        }
        async fn fetch_today(&self) -> Result<Vec<Reading>> {
            self.answer("today", &self.today)
        }
        async fn fetch_net_status(&self) -> Result<NetStatus> {
            self.answer("netstatus", &self.net)
        }
        async fn submit_setpoint(&self, value: f64) -> Result<()> {
            self.submit(format!("setpoint={}", value))
        }
        async fn submit_wifi(&self, ssid: &str, _password: &str) -> Result<()> {
            self.submit(format!("wifi={}", ssid))
        }
        async fn request_time_sync(&self) -> Result<()> {
            self.submit("ntpsync".to_string())
        }
    }

    fn online() -> FakeDevice {
        FakeDevice {
            state: Some(DeviceState { temp: Some(26.4), umid: Some(65.0), alvo: Some(27.0), lampada: true }),
            today: Some(vec![Reading {
                data: None,
                hora: "12:00".into(),
                temp: Some(26.4),
                umid: Some(65.0),
            }]),
            net: Some(NetStatus { sta_connected: true, ssid: Some("casa".into()), ..Default::default() }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_poll_fetches_in_order() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        let snap = dash.poll().await;
        assert_eq!(dash.device().calls(), vec!["state", "today", "netstatus"]);
        assert_eq!(snap.readings().len(), 1);
        let text = snap.render_text();
        assert!(text.contains("Lamp        : On"));
        assert!(text.contains("Wi-Fi       : Connected"));
    }

    #[tokio::test]
    async fn test_failed_section_does_not_block_others() {
        let device = FakeDevice { state: None, ..online() };
        let dash = Dashboard::new(device, Layout::Sequential);
        let snap = dash.poll().await;
        assert!(snap.state.is_none());
        assert!(snap.today.is_some());
        assert!(snap.net.is_some());
        assert!(snap.render_text().contains("(state unavailable)"));
    }

    #[tokio::test]
    async fn test_setpoint_refreshes_state() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        let notice = dash.update_setpoint(28.5).await;
        assert!(notice.ok);
        assert_eq!(notice.message, "Setpoint updated.");
        assert!(notice.refreshed.unwrap().contains("Setpoint    : 27.0 °C"));
        assert_eq!(dash.device().calls(), vec!["setpoint=28.5", "state"]);
    }

    #[tokio::test]
    async fn test_setpoint_rejects_nan_without_request() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        let notice = dash.update_setpoint(f64::NAN).await;
        assert!(!notice.ok);
        assert!(dash.device().calls().is_empty());
    }

    #[tokio::test]
    async fn test_wifi_failure_is_reported() {
        let device = FakeDevice { reject_submits: true, ..online() };
        let dash = Dashboard::new(device, Layout::Sequential);
        let notice = dash.configure_wifi("casa", "segredo").await;
        assert_eq!(notice, Notice::failure("Failed to send Wi-Fi configuration."));
        assert_eq!(dash.device().calls(), vec!["wifi=casa"]);
    }

    #[tokio::test]
    async fn test_wifi_requires_ssid() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        assert!(!dash.configure_wifi("  ", "x").await.ok);
        assert!(dash.device().calls().is_empty());
    }

    #[tokio::test]
    async fn test_sync_time_refreshes_net_status() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        let notice = dash.sync_time().await;
        assert!(notice.ok);
        assert_eq!(dash.device().calls(), vec!["ntpsync", "netstatus"]);
    }

    #[tokio::test]
    async fn test_run_stops_after_cycles() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        let mut seen = 0;
        let done = dash
            .run(Duration::from_millis(5), Some(3), |snap| {
                assert!(snap.state.is_some());
                seen += 1;
                Ok(())
            })
            .await;
        assert_eq!(done, 3);
        assert_eq!(seen, 3);
        assert_eq!(dash.device().calls().len(), 9);
    }

    #[tokio::test]
    async fn test_failed_output_keeps_watching() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        let mut attempts = 0;
        let done = dash
            .run_until(Duration::from_millis(1), Some(3), std::future::pending::<()>(), |_| {
                attempts += 1;
                if attempts == 1 {
                    Err(anyhow!("chart directory vanished"))
                } else {
                    Ok(())
                }
            })
            .await;
        assert_eq!(done, 3);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_zero_period_does_not_panic() {
        let dash = Dashboard::new(online(), Layout::Sequential);
        let done = dash.run_until(Duration::ZERO, Some(2), std::future::pending::<()>(), |_| Ok(())).await;
        assert_eq!(done, 2);
    }

    /// Device whose state fetch hangs well past the shutdown signal.
    struct SlowDevice(FakeDevice);

    #[async_trait]
    impl Device for SlowDevice {
        async fn fetch_state(&self) -> Result<DeviceState> {
            tokio::time::sleep(Duration::from_millis(400)).await;
            self.0.fetch_state().await
        }
        async fn fetch_today(&self) -> Result<Vec<Reading>> {
            self.0.fetch_today().await
        }
        async fn fetch_net_status(&self) -> Result<NetStatus> {
            self.0.fetch_net_status().await
        }
        async fn submit_setpoint(&self, value: f64) -> Result<()> {
            self.0.submit_setpoint(value).await
        }
        async fn submit_wifi(&self, ssid: &str, password: &str) -> Result<()> {
            self.0.submit_wifi(ssid, password).await
        }
        async fn request_time_sync(&self) -> Result<()> {
            self.0.request_time_sync().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_during_poll_stops_loop() {
        let dash = Dashboard::new(SlowDevice(online()), Layout::Sequential);
        let shutdown = tokio::time::sleep(Duration::from_millis(150));
        let mut delivered = 0;
        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            dash.run_until(Duration::from_millis(10), None, shutdown, |_| {
                delivered += 1;
                Ok(())
            }),
        )
        .await;
        assert_eq!(outcome.expect("loop ignored shutdown"), 0);
        assert_eq!(delivered, 0);
        assert_eq!(dash.device().0.calls(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_render_chart_uses_layout() {
        let dash = Dashboard::new(online(), Layout::TimeOfDay);
        let snap = dash.poll().await;
        let svg = dash.render_chart(&snap);
        assert!(svg.contains(r#"points="50.03,30.00""#));
    }
}

//! `HttpDevice` against an in-process mock of the controller firmware.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use terrario::chart::Layout;
use terrario::config::Config;
use terrario::dashboard::Dashboard;
use terrario::device::{Device, HttpDevice, StatusError};

#[derive(Clone, Default)]
struct Firmware {
    posts: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
    syncs: Arc<AtomicU32>,
    flaky_hits: Arc<AtomicU32>,
}

async fn state() -> Json<Value> {
    Json(json!({"temp": null, "umid": 64.5, "alvo": 27.0, "lampada": 1}))
}

async fn today() -> Json<Value> {
    Json(json!([
        {"data": "0000-00-00", "hora": "08:00", "temp": 25.0, "umid": 70.0},
        {"data": "2024-03-01", "hora": "08:10", "temp": 25.5, "umid": 68.0}
    ]))
}

async fn flaky_netstatus(State(fw): State<Firmware>) -> Result<Json<Value>, StatusCode> {
    if fw.flaky_hits.fetch_add(1, Ordering::SeqCst) < 2 {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!({
        "sta_connected": false,
        "sta_configured": true,
        "time_valid": true,
        "datetime": "2024-03-01 08:10:00",
        "ssid": "casa"
    })))
}

async fn setpoint(State(fw): State<Firmware>, Form(form): Form<HashMap<String, String>>) -> StatusCode {
    fw.posts.lock().unwrap().push(("setpoint".to_string(), form));
    StatusCode::OK
}

async fn wifi(State(fw): State<Firmware>, Form(form): Form<HashMap<String, String>>) -> StatusCode {
    fw.posts.lock().unwrap().push(("wifi".to_string(), form));
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn ntpsync(State(fw): State<Firmware>) -> &'static str {
    fw.syncs.fetch_add(1, Ordering::SeqCst);
    "OK"
}

async fn spawn_firmware(fw: Firmware) -> SocketAddr {
    let app = Router::new()
        .route("/api/state", get(state))
        .route("/api/today", get(today))
        .route("/api/netstatus", get(flaky_netstatus))
        .route("/api/setpoint", post(setpoint))
        .route("/api/wifi", post(wifi))
        .route("/api/ntpsync", get(ntpsync))
        .with_state(fw);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, retries: u32) -> Config {
    Config {
        base_url: format!("http://{}", addr),
        retries,
        retry_base_ms: 1,
        ..Config::default()
    }
}

#[tokio::test]
async fn fetches_state_and_readings() {
    let addr = spawn_firmware(Firmware::default()).await;
    let dev = HttpDevice::new(&config(addr, 0)).unwrap();

    let s = dev.fetch_state().await.unwrap();
    assert_eq!(s.temp, None);
    assert_eq!(s.umid, Some(64.5));
    assert_eq!(s.alvo, Some(27.0));
    assert!(s.lampada);

    let readings = dev.fetch_today().await.unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].date(), None);
    assert_eq!(readings[1].date(), Some("2024-03-01"));
}

#[tokio::test]
async fn status_error_without_retries() {
    let addr = spawn_firmware(Firmware::default()).await;
    let dev = HttpDevice::new(&config(addr, 0)).unwrap();

    let err = dev.fetch_net_status().await.unwrap_err();
    let status = err.downcast_ref::<StatusError>().expect("status error");
    assert_eq!(status.status, 503);
    assert_eq!(status.endpoint, "/api/netstatus");
}

#[tokio::test]
async fn retries_transient_status() {
    let fw = Firmware::default();
    let addr = spawn_firmware(fw.clone()).await;
    let dev = HttpDevice::new(&config(addr, 2)).unwrap();

    let net = dev.fetch_net_status().await.unwrap();
    assert_eq!(net.configured_ssid(), Some("casa"));
    assert_eq!(net.clock(), Some("2024-03-01 08:10:00"));
    assert_eq!(fw.flaky_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn setpoint_posts_one_decimal_form_field() {
    let fw = Firmware::default();
    let addr = spawn_firmware(fw.clone()).await;
    let dash = Dashboard::new(HttpDevice::new(&config(addr, 0)).unwrap(), Layout::Sequential);

    let notice = dash.update_setpoint(27.46).await;
    assert!(notice.ok, "{}", notice.message);

    let posts = fw.posts.lock().unwrap().clone();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "setpoint");
    assert_eq!(posts[0].1.get("valor").map(String::as_str), Some("27.5"));
}

#[tokio::test]
async fn wifi_failure_surfaces_notice() {
    let fw = Firmware::default();
    let addr = spawn_firmware(fw.clone()).await;
    let dash = Dashboard::new(HttpDevice::new(&config(addr, 0)).unwrap(), Layout::Sequential);

    let notice = dash.configure_wifi("casa", "p@ss word").await;
    assert!(!notice.ok);
    assert_eq!(notice.message, "Failed to send Wi-Fi configuration.");

    let posts = fw.posts.lock().unwrap().clone();
    assert_eq!(posts[0].1.get("ssid").map(String::as_str), Some("casa"));
    assert_eq!(posts[0].1.get("senha").map(String::as_str), Some("p@ss word"));
}

#[tokio::test]
async fn time_sync_hits_trigger_once() {
    let fw = Firmware::default();
    let addr = spawn_firmware(fw.clone()).await;
    let dev = HttpDevice::new(&config(addr, 0)).unwrap();

    dev.request_time_sync().await.unwrap();
    assert_eq!(fw.syncs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_device_fails_poll_sections() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dash = Dashboard::new(HttpDevice::new(&config(addr, 0)).unwrap(), Layout::Sequential);
    let snap = dash.poll().await;
    assert!(snap.state.is_none());
    assert!(snap.today.is_none());
    assert!(snap.net.is_none());
    assert!(snap.render_text().contains("(readings unavailable)"));
}

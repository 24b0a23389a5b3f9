use std::fmt::Write as _;

use crate::model::{DeviceState, LinkState, NetStatus, Reading};

pub const UNAVAILABLE: &str = "--";

pub fn format_measure(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1} {}", v, unit),
        None => format!("{} {}", UNAVAILABLE, unit),
    }
}

pub fn format_setpoint(value: Option<f64>) -> String {
    format_measure(value, "°C")
}

pub fn format_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| UNAVAILABLE.to_string())
}

pub fn lamp_label(on: bool) -> &'static str {
    if on {
        "On"
    } else {
        "Off"
    }
}

pub fn link_label(link: LinkState) -> &'static str {
    match link {
        LinkState::Connected => "Connected",
        LinkState::Connecting => "Connecting",
        LinkState::Disconnected => "Disconnected",
    }
}

/// Value a setpoint form is pre-filled with.
pub fn setpoint_prefill(state: &DeviceState) -> Option<String> {
    state.alvo.map(|v| format!("{:.1}", v))
}

pub fn render_state(state: &DeviceState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Temperature : {}", format_measure(state.temp, "°C"));
    let _ = writeln!(out, "Humidity    : {}", format_measure(state.umid, "%"));
    let _ = writeln!(out, "Setpoint    : {}", format_setpoint(state.alvo));
    let _ = writeln!(out, "Lamp        : {}", lamp_label(state.lampada));
    out
}

pub fn render_net_status(net: &NetStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Wi-Fi       : {}", link_label(net.link()));
    let _ = writeln!(out, "Device time : {}", net.clock().unwrap_or("Offline"));
    let _ = writeln!(out, "SSID        : {}", net.configured_ssid().unwrap_or("Not configured"));
    out
}

const HEADERS: [&str; 4] = ["Date", "Time", "Temp (°C)", "Humidity (%)"];

/// Readings table, one row per reading in the order received.
pub fn render_table(readings: &[Reading]) -> String {
    let rows: Vec<[String; 4]> = readings
        .iter()
        .map(|r| {
            [
                r.date().unwrap_or("-").to_string(),
                r.hora.clone(),
                format_cell(r.temp),
                format_cell(r.umid),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    if rows.is_empty() {
        out.push_str("(no readings today)\n");
    }
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(c, w)| format!("{}{}", c, " ".repeat(w - c.chars().count())))
        .collect();
    let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
}

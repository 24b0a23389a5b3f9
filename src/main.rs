use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use serde_json::json;

use terrario::config::Config;
use terrario::dashboard::{Dashboard, Notice, Snapshot};
use terrario::device::HttpDevice;
use terrario::logging::{log, obj, v_str, Domain, Level};

const USAGE: &str = "\
usage: terrario [command]

commands:
  watch                  poll and print every POLL_SECS (default)
  once                   poll once and print
  setpoint <value>       submit a new target temperature
  wifi <ssid> <password> submit Wi-Fi credentials
  ntp-sync               ask the device to sync its clock
  chart <out.svg>        write today's chart as SVG

environment:
  TERRARIO_URL, POLL_SECS, HTTP_TIMEOUT_MS, RETRIES, RETRY_BASE_MS,
  CHART_LAYOUT (sequential|time-of-day), CHART_SVG, LOG_LEVEL, LOG_DOMAINS, LOG_DIR";

#[derive(Debug, PartialEq)]
enum Command {
    Watch,
    Once,
    Setpoint(f64),
    Wifi { ssid: String, password: String },
    NtpSync,
    Chart(PathBuf),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let arg = |i: usize, what: &str| -> Result<&String> {
        args.get(i).ok_or_else(|| anyhow!("missing {}", what))
    };
    let cmd = match args.first().map(String::as_str) {
        None | Some("watch") => Command::Watch,
        Some("once") => Command::Once,
        Some("setpoint") => {
            let raw = arg(1, "setpoint value")?;
            let value: f64 = raw
                .trim()
                .replace(',', ".")
                .parse()
                .with_context(|| format!("invalid setpoint {}", raw))?;
            Command::Setpoint(value)
        }
        Some("wifi") => Command::Wifi {
            ssid: arg(1, "ssid")?.clone(),
            password: args.get(2).cloned().unwrap_or_default(),
        },
        Some("ntp-sync") => Command::NtpSync,
        Some("chart") => Command::Chart(PathBuf::from(arg(1, "output path")?)),
        Some("-h") | Some("--help") | Some("help") => Command::Help,
        Some(other) => return Err(anyhow!("unknown command {}", other)),
    };
    Ok(cmd)
}

fn report(notice: &Notice) -> ExitCode {
    if notice.ok {
        println!("{}", notice.message);
        if let Some(section) = &notice.refreshed {
            print!("{}", section);
        }
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", notice.message);
        ExitCode::FAILURE
    }
}

fn write_chart(path: &Path, svg: &str) -> Result<()> {
    std::fs::write(path, svg).with_context(|| format!("writing chart to {}", path.display()))
}

async fn run(cmd: Command, cfg: Config) -> Result<ExitCode> {
    let device = HttpDevice::new(&cfg)?;
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[("device", v_str(device.base_url().as_str())), ("command", v_str(&format!("{:?}", cmd)))]),
    );
    let dash = Dashboard::new(device, cfg.chart_layout);

    let code = match cmd {
        Command::Watch => {
            let cycles = dash
                .run(cfg.poll_interval(), None, |snapshot| {
                    println!("{}", snapshot.render_text());
                    if let Some(path) = &cfg.chart_svg {
                        write_chart(path, &dash.render_chart(snapshot))?;
                    }
                    Ok(())
                })
                .await;
            log(Level::Info, Domain::System, "shutdown", obj(&[("cycles", json!(cycles))]));
            ExitCode::SUCCESS
        }
        Command::Once => {
            let snapshot = dash.poll().await;
            print!("{}", snapshot.render_text());
            if let Some(path) = &cfg.chart_svg {
                write_chart(path, &dash.render_chart(&snapshot))?;
            }
            ExitCode::SUCCESS
        }
        Command::Chart(path) => {
            let snapshot = Snapshot { today: dash.refresh_today().await, ..Default::default() };
            if snapshot.today.is_none() {
                return Err(anyhow!("could not fetch today's readings"));
            }
            write_chart(&path, &dash.render_chart(&snapshot))?;
            println!("chart written to {}", path.display());
            ExitCode::SUCCESS
        }
        Command::Setpoint(value) => report(&dash.update_setpoint(value).await),
        Command::Wifi { ssid, password } => report(&dash.configure_wifi(&ssid, &password).await),
        Command::NtpSync => report(&dash.sync_time().await),
        Command::Help => {
            println!("{}", USAGE);
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = match parse_args(&args) {
        Ok(cmd) => cmd,
        Err(err) => {
            eprintln!("error: {:#}\n\n{}", err, USAGE);
            return ExitCode::from(2);
        }
    };
    match run(cmd, Config::from_env()).await {
        Ok(code) => code,
        Err(err) => {
            log(Level::Fatal, Domain::System, "fatal", obj(&[("error", v_str(&format!("{:#}", err)))]));
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

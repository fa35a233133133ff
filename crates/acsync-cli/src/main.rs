//! acsync entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads the env
//! config, resolves the date window and wires the attendance client and
//! device gateways into the reconciliation driver. All reconciliation
//! logic lives in acsync-reconcile.

mod config;

use acsync_attendance::{snapshot::format_offset, AttendanceClient, TokenProvider};
use acsync_device::{DeviceClient, DeviceGateway};
use acsync_reconcile::{reconcile_all, resolve_window};
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use config::AppConfig;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "acsync")]
#[command(about = "Reconcile access-control clock events against attendance records", long_about = None)]
struct Cli {
    /// Inclusive period start (YYYY-MM-DD). Defaults to LAST_DAYS ago.
    #[arg(long)]
    period_start: Option<String>,

    /// Inclusive period end (YYYY-MM-DD). Requires --period-start;
    /// defaults to the start date when only that is given, else today.
    #[arg(long)]
    period_end: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file
    // does not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let now = Local::now();
    let local_offset = format_offset(now.offset().local_minus_utc());
    let window = resolve_window(
        cli.period_start.as_deref(),
        cli.period_end.as_deref(),
        now.date_naive(),
        config.last_days,
        local_offset,
    )?;

    info!(
        start = %window.start_date,
        end = %window.end_date,
        "reconciling attendance data"
    );

    let attendance = AttendanceClient::new(
        &config.attendance_query_base_url,
        &config.attendance_submit_url,
        TokenProvider::new(config.token.clone()),
    );

    let snapshot = attendance
        .load_snapshot(&window.start_date, &window.end_date, &window.tz_offset)
        .await
        .context("attendance snapshot load failed")?;

    let mut devices: Vec<Box<dyn DeviceGateway>> = Vec::new();
    for entry in &config.devices {
        match DeviceClient::new(&entry.url, &entry.username, &entry.password) {
            Ok(client) => devices.push(Box::new(client)),
            Err(err) => error!(
                device = %entry.url,
                "skipping device, client construction failed: {err:#}"
            ),
        }
    }

    let summary = reconcile_all(devices, &attendance, &snapshot, &window).await;

    info!(
        devices = summary.devices_processed(),
        failed = summary.devices_failed,
        submitted = summary.total_submitted(),
        "all devices processed"
    );
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

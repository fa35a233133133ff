//! Per-device reconciliation loop.

use crate::{DeviceReport, RunSummary};
use acsync_attendance::{punch_key, AttendanceSnapshot, PunchPhoto, PunchRecord, PunchSink};
use acsync_device::{DeviceGateway, EventWindow};
use anyhow::{Context, Result};
use chrono::DateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events requested per page. Also seeds the total-match count so at
/// least one page is always fetched.
pub const EVENT_PAGE_SIZE: u32 = 24;

/// Parse a device-reported event time to whole unix seconds.
///
/// Devices emit ISO-like strings with an offset; a couple of common
/// variants are accepted.
fn parse_event_time(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%z"))
        .ok()
        .map(|dt| dt.timestamp())
}

/// Reconcile a single device against the snapshot.
///
/// Any error returned here aborts the device; the caller decides whether
/// the run continues (it does).
pub async fn reconcile_device<D, S>(
    device: &mut D,
    sink: &S,
    snapshot: &AttendanceSnapshot,
    window: &EventWindow,
) -> Result<DeviceReport>
where
    D: DeviceGateway + ?Sized,
    S: PunchSink + ?Sized,
{
    let device_name = device
        .device_name()
        .await
        .context("device identification failed")?;
    info!(
        device = %device_name,
        endpoint = %device.endpoint(),
        "processing device"
    );

    let mut report = DeviceReport {
        endpoint: device.endpoint().to_string(),
        device_name: device_name.clone(),
        ..DeviceReport::default()
    };

    // One search id per device: the device keys its search cursor on it,
    // so it must stay stable across all pages of this loop.
    let search_id = Uuid::new_v4();
    let mut offset: u64 = 0;
    let mut total_matches: u64 = u64::from(EVENT_PAGE_SIZE);

    while offset < total_matches {
        let page = device
            .events_page(&search_id, EVENT_PAGE_SIZE, offset, window)
            .await
            .with_context(|| format!("event search failed at offset {offset}"))?;

        // The device re-reports the total on every page and it may drift
        // while events keep arriving; always trust the latest value.
        total_matches = page.total_matches;

        let Some(events) = page.events else {
            // No item list at all: the device has nothing more to say,
            // whatever total_matches claims.
            break;
        };

        for event in events {
            let Some(employee_id) = event
                .employee_no
                .as_deref()
                .filter(|id| !id.is_empty())
            else {
                continue;
            };
            report.valid_records += 1;

            let Some(timestamp) = parse_event_time(&event.time) else {
                warn!(
                    device = %device_name,
                    time = %event.time,
                    employee = employee_id,
                    "skipping event with unparseable time"
                );
                report.unparseable_times += 1;
                continue;
            };

            let key = punch_key(timestamp, employee_id);
            if snapshot.contains(&key) {
                report.already_recorded += 1;
                continue;
            }

            info!(
                device = %device_name,
                time = %event.time,
                employee = employee_id,
                name = event.name.as_deref().unwrap_or(""),
                "event missing from attendance, submitting"
            );

            let photo = match &event.picture_url {
                Some(url) => PunchPhoto::jpeg(
                    device
                        .picture(url)
                        .await
                        .context("event picture fetch failed")?,
                ),
                None => PunchPhoto::placeholder()?,
            };

            let punch = PunchRecord {
                date_time: event.time.clone(),
                employee_id: employee_id.to_string(),
                gate_name: device_name.clone(),
                photo,
            };
            match sink.submit(punch).await {
                Ok(()) => report.submitted += 1,
                Err(err) => {
                    error!(
                        device = %device_name,
                        employee = employee_id,
                        "punch submission failed, skipping record: {err:#}"
                    );
                    report.submit_failures += 1;
                }
            }
        }

        offset += u64::from(EVENT_PAGE_SIZE);
        info!(
            device = %device_name,
            processed = offset.min(total_matches),
            total = total_matches,
            "page complete"
        );
    }

    info!(
        device = %device_name,
        valid_records = report.valid_records,
        submitted = report.submitted,
        "device complete"
    );
    Ok(report)
}

/// Reconcile every device in order. Device failures are logged and the
/// run continues; this function itself never fails.
pub async fn reconcile_all<S>(
    mut devices: Vec<Box<dyn DeviceGateway>>,
    sink: &S,
    snapshot: &AttendanceSnapshot,
    window: &EventWindow,
) -> RunSummary
where
    S: PunchSink + ?Sized,
{
    let mut summary = RunSummary::default();

    for device in devices.iter_mut() {
        match reconcile_device(device.as_mut(), sink, snapshot, window).await {
            Ok(report) => summary.reports.push(report),
            Err(err) => {
                error!(endpoint = %device.endpoint(), "device aborted: {err:#}");
                summary.devices_failed += 1;
            }
        }
    }

    summary
}

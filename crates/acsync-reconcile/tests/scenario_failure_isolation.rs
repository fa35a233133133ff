//! Failure-scope scenarios: a broken device or a failing submission must
//! never take down more than its own scope.

use acsync_attendance::{AttendanceSnapshot, PunchRecord, PunchSink};
use acsync_device::{DeviceEvent, DeviceGateway, EventPage, EventWindow};
use acsync_reconcile::{reconcile_all, reconcile_device};
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

struct StubDevice {
    name: String,
    /// Fails the metadata call when set.
    broken: bool,
    pages: Vec<EventPage>,
    served: usize,
}

impl StubDevice {
    fn single_page(name: &str, events: Vec<DeviceEvent>) -> Self {
        let total = events.len() as u64;
        Self {
            name: name.to_string(),
            broken: false,
            pages: vec![EventPage {
                total_matches: total,
                events: Some(events),
            }],
            served: 0,
        }
    }
}

#[async_trait::async_trait]
impl DeviceGateway for StubDevice {
    fn endpoint(&self) -> &str {
        "https://device.test"
    }

    async fn device_name(&mut self) -> Result<String> {
        if self.broken {
            bail!("connection refused");
        }
        Ok(self.name.clone())
    }

    async fn events_page(
        &mut self,
        _search_id: &Uuid,
        _page_size: u32,
        _offset: u64,
        _window: &EventWindow,
    ) -> Result<EventPage> {
        let page = self.pages[self.served].clone();
        self.served += 1;
        Ok(page)
    }

    async fn picture(&mut self, _picture_url: &str) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8])
    }
}

/// Sink that rejects every punch.
#[derive(Default)]
struct FailingSink {
    attempts: AtomicU64,
}

#[async_trait::async_trait]
impl PunchSink for FailingSink {
    async fn submit(&self, _punch: PunchRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        bail!("storage rejected the record");
    }
}

#[derive(Default)]
struct CountingSink {
    punches: Mutex<Vec<PunchRecord>>,
}

#[async_trait::async_trait]
impl PunchSink for CountingSink {
    async fn submit(&self, punch: PunchRecord) -> Result<()> {
        self.punches.lock().unwrap().push(punch);
        Ok(())
    }
}

fn event(time: &str, employee: &str) -> DeviceEvent {
    DeviceEvent {
        time: time.to_string(),
        name: None,
        employee_no: Some(employee.to_string()),
        picture_url: None,
    }
}

fn window() -> EventWindow {
    EventWindow {
        start_date: "2023-11-01".to_string(),
        end_date: "2023-11-14".to_string(),
        tz_offset: "+00:00".to_string(),
    }
}

#[tokio::test]
async fn scenario_submission_failures_do_not_abort_the_device() {
    let snapshot = AttendanceSnapshot::default();
    let mut device = StubDevice::single_page(
        "Front Gate",
        vec![
            event("2023-11-14T08:00:00Z", "E1"),
            event("2023-11-14T08:01:00Z", "E2"),
        ],
    );
    let sink = FailingSink::default();

    let report = reconcile_device(&mut device, &sink, &snapshot, &window())
        .await
        .unwrap();

    // Every record was attempted despite each one failing.
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(report.valid_records, 2);
    assert_eq!(report.submitted, 0);
    assert_eq!(report.submit_failures, 2);
}

#[tokio::test]
async fn scenario_failed_device_does_not_stop_the_run() {
    let snapshot = AttendanceSnapshot::default();
    let devices: Vec<Box<dyn DeviceGateway>> = vec![
        Box::new(StubDevice {
            name: "Dead Gate".to_string(),
            broken: true,
            pages: vec![],
            served: 0,
        }),
        Box::new(StubDevice::single_page(
            "Live Gate",
            vec![event("2023-11-14T08:00:00Z", "E1")],
        )),
    ];
    let sink = CountingSink::default();

    let summary = reconcile_all(devices, &sink, &snapshot, &window()).await;

    assert_eq!(summary.devices_failed, 1);
    assert_eq!(summary.devices_processed(), 1);
    assert_eq!(summary.reports[0].device_name, "Live Gate");
    assert_eq!(summary.total_submitted(), 1);
    assert_eq!(sink.punches.into_inner().unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_pagination_stops_when_the_item_list_is_absent() {
    let snapshot = AttendanceSnapshot::default();
    // The device claims 100 matches but the second page has no list at
    // all; pagination must stop there instead of spinning to offset 100.
    let mut device = StubDevice {
        name: "Front Gate".to_string(),
        broken: false,
        pages: vec![
            EventPage {
                total_matches: 100,
                events: Some(vec![event("2023-11-14T08:00:00Z", "E1")]),
            },
            EventPage {
                total_matches: 100,
                events: None,
            },
        ],
        served: 0,
    };
    let sink = CountingSink::default();

    let report = reconcile_device(&mut device, &sink, &snapshot, &window())
        .await
        .unwrap();

    assert_eq!(device.served, 2);
    assert_eq!(report.submitted, 1);
}

#[tokio::test]
async fn scenario_unparseable_event_times_are_skipped_not_fatal() {
    let snapshot = AttendanceSnapshot::default();
    let mut device = StubDevice::single_page(
        "Front Gate",
        vec![
            event("garbage", "E1"),
            event("2023-11-14T08:01:00Z", "E2"),
        ],
    );
    let sink = CountingSink::default();

    let report = reconcile_device(&mut device, &sink, &snapshot, &window())
        .await
        .unwrap();

    assert_eq!(report.valid_records, 2);
    assert_eq!(report.unparseable_times, 1);
    assert_eq!(report.submitted, 1);
    let punches = sink.punches.into_inner().unwrap();
    assert_eq!(punches[0].employee_id, "E2");
}

//! acsync-device
//!
//! ISAPI access-control device client: device metadata, paginated
//! event-log search and picture retrieval, all over the digest transport
//! from `acsync-digest`.
//!
//! This crate owns the device-side boundary trait ([`DeviceGateway`]) and
//! its concrete implementation ([`client::DeviceClient`]); the
//! reconciliation driver is written against the trait so device behavior
//! can be simulated in tests without a network.

pub mod client;
pub mod info;
pub mod query;

pub use client::DeviceClient;

use anyhow::Result;
use serde::Deserialize;
use uuid::Uuid;

/// Date window for one reconciliation run, pre-formatted the way the
/// device API expects it: `YYYY-MM-DD` dates plus a `±HH:MM` UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWindow {
    pub start_date: String,
    pub end_date: String,
    pub tz_offset: String,
}

/// One access-control event as reported by a device.
///
/// Transient: produced per page and consumed immediately. Events without
/// an employee number are device noise (door held open, tamper alarms,
/// unrecognized faces) and are skipped by callers.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEvent {
    /// Event timestamp as an ISO-like string, verbatim from the device.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "employeeNoString", default)]
    pub employee_no: Option<String>,
    #[serde(rename = "pictureURL", default)]
    pub picture_url: Option<String>,
}

/// One page of an event search.
#[derive(Debug, Clone)]
pub struct EventPage {
    /// Total match count as reported by the device. May change between
    /// pages; callers must re-read it from every page.
    pub total_matches: u64,
    /// Events in this page. `None` (the device omitted the list entirely)
    /// terminates pagination even when `total_matches` claims more.
    pub events: Option<Vec<DeviceEvent>>,
}

/// Device-side boundary used by the reconciliation driver.
///
/// Methods take `&mut self` because every call mutates the device's digest
/// challenge state; the type system enforces that no two requests for one
/// device are ever in flight at once.
#[async_trait::async_trait]
pub trait DeviceGateway: Send {
    /// Device endpoint, for log labels.
    fn endpoint(&self) -> &str;

    /// Fetch the device's display name from its metadata endpoint.
    async fn device_name(&mut self) -> Result<String>;

    /// Fetch one page of the event search identified by `search_id`.
    async fn events_page(
        &mut self,
        search_id: &Uuid,
        page_size: u32,
        offset: u64,
        window: &EventWindow,
    ) -> Result<EventPage>;

    /// Fetch the raw image bytes behind a device-reported picture URL.
    async fn picture(&mut self, picture_url: &str) -> Result<Vec<u8>>;
}

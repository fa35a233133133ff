//! acsync-attendance
//!
//! Attendance API client: OAuth bearer-token acquisition (cached),
//! paginated snapshot loading into a punch-key set, and multipart punch
//! submission.
//!
//! The snapshot set is built once per run before any device is processed
//! and is read-only afterwards; everything else here is stateless apart
//! from the token cache.

pub mod snapshot;
pub mod submit;
pub mod token;

pub use snapshot::{punch_key, AttendanceSnapshot};
pub use submit::{PunchPhoto, PunchRecord, PunchSink};
pub use token::{TokenConfig, TokenProvider};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Attendance records per page; the query API caps at this.
const PER_PAGE: u64 = 100;

/// Client for the attendance records API.
///
/// Holds the token provider so every request picks up a fresh (or cached)
/// bearer token.
#[derive(Debug)]
pub struct AttendanceClient {
    http: reqwest::Client,
    /// Base of the range-query endpoint.
    query_base_url: String,
    /// Full URL of the submission endpoint.
    submit_url: String,
    token: TokenProvider,
}

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    data: Vec<RangeRecord>,
    meta: RangeMeta,
}

#[derive(Debug, Deserialize)]
struct RangeRecord {
    /// Naive local timestamp, `YYYY-MM-DD HH:MM:SS`.
    checked_time_by_timezone: String,
    employee_id: String,
    /// IANA zone name the device reported for this record.
    #[serde(default)]
    timezone_device: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeMeta {
    total: u64,
}

impl AttendanceClient {
    pub fn new(
        query_base_url: impl Into<String>,
        submit_url: impl Into<String>,
        token: TokenProvider,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            query_base_url: query_base_url.into().trim_end_matches('/').to_string(),
            submit_url: submit_url.into(),
            token,
        }
    }

    /// Load the full attendance snapshot for an inclusive date range.
    ///
    /// Paginates until the reported total is covered; the total is re-read
    /// from every page since the authoritative value may settle only after
    /// the first page. Any page failure is fatal — there is no safe partial
    /// reconciliation against an incomplete snapshot.
    ///
    /// `local_offset` is the host-local `±HH:MM` offset, used for records
    /// whose device timezone is missing or unresolvable.
    pub async fn load_snapshot(
        &self,
        start_date: &str,
        end_date: &str,
        local_offset: &str,
    ) -> Result<AttendanceSnapshot> {
        let mut snapshot = AttendanceSnapshot::default();
        let mut offset_cache: HashMap<String, Option<String>> = HashMap::new();
        let mut page: u64 = 0;

        loop {
            page += 1;
            debug!(page, "fetching attendance page");
            let token = self.token.bearer_token().await?;
            let url = format!("{}/range/{}/{}", self.query_base_url, start_date, end_date);
            let response = self
                .http
                .get(&url)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .bearer_auth(token)
                .send()
                .await
                .with_context(|| format!("attendance range request failed (page {page})"))?;

            if !response.status().is_success() {
                bail!(
                    "attendance range request returned status {} (page {page})",
                    response.status().as_u16()
                );
            }

            let body: RangeResponse = response
                .json()
                .await
                .with_context(|| format!("attendance range decode failed (page {page})"))?;

            for record in &body.data {
                let offset = record
                    .timezone_device
                    .as_deref()
                    .and_then(|zone| {
                        offset_cache
                            .entry(zone.to_string())
                            .or_insert_with(|| snapshot::zone_offset(zone))
                            .clone()
                    })
                    .unwrap_or_else(|| local_offset.to_string());

                match snapshot::normalize_timestamp(&record.checked_time_by_timezone, &offset) {
                    Some(ts) => {
                        snapshot.insert(punch_key(ts, &record.employee_id));
                    }
                    None => warn!(
                        time = %record.checked_time_by_timezone,
                        employee = %record.employee_id,
                        "skipping attendance record with unparseable time"
                    ),
                }
            }

            if page * PER_PAGE >= body.meta.total {
                break;
            }
        }

        info!(records = snapshot.len(), "attendance snapshot loaded");
        Ok(snapshot)
    }
}

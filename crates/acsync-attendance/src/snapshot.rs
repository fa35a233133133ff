//! Punch-key normalization and the per-run attendance snapshot set.

use chrono::{DateTime, Offset, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;

/// De-duplication identity of one punch: `"{unix_seconds}:{employee_id}"`.
///
/// Two events are the same punch iff their keys are equal — there is no
/// tolerance window.
pub fn punch_key(unix_seconds: i64, employee_id: &str) -> String {
    format!("{unix_seconds}:{employee_id}")
}

/// Set of punch keys already present in the attendance system.
///
/// Built once per run by the snapshot loader, then read-only while the
/// devices are processed.
#[derive(Debug, Default, Clone)]
pub struct AttendanceSnapshot {
    keys: HashSet<String>,
}

impl AttendanceSnapshot {
    /// Build directly from keys (tests and simulations).
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn insert(&mut self, key: String) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Render a UTC offset in seconds as `±HH:MM`.
pub fn format_offset(total_seconds: i32) -> String {
    let sign = if total_seconds < 0 { '-' } else { '+' };
    let minutes = total_seconds.abs() / 60;
    format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}

/// Resolve an IANA zone name to its current `±HH:MM` UTC offset.
///
/// Attendance records carry naive local timestamps plus a zone name; the
/// zone's present-day offset is applied to them. Unknown names yield
/// `None` and the caller falls back to the host-local offset.
pub fn zone_offset(zone_name: &str) -> Option<String> {
    let tz: Tz = zone_name.parse().ok()?;
    let offset_seconds = Utc::now().with_timezone(&tz).offset().fix().local_minus_utc();
    Some(format_offset(offset_seconds))
}

/// Normalize a naive `YYYY-MM-DD HH:MM:SS` local timestamp plus a `±HH:MM`
/// offset to whole unix seconds. Returns `None` when the combination does
/// not parse as a valid instant.
pub fn normalize_timestamp(naive_local: &str, offset: &str) -> Option<i64> {
    let composed = format!("{}{}", naive_local.replacen(' ', "T", 1), offset);
    DateTime::parse_from_rfc3339(&composed)
        .ok()
        .map(|dt| dt.timestamp())
}

//! Date-window resolution for one reconciliation run.

use acsync_device::EventWindow;
use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(raw: &str, what: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .with_context(|| format!("{what} '{raw}' is not a YYYY-MM-DD date"))
}

/// Resolve the reconciliation window from the CLI period arguments.
///
/// - an end date without a start date is a configuration error;
/// - a start date after the end date is a configuration error;
/// - a start date alone means a single-day window;
/// - neither means the trailing `last_days` window ending today.
///
/// All validation happens here, before any network call is made.
pub fn resolve_window(
    period_start: Option<&str>,
    period_end: Option<&str>,
    today: NaiveDate,
    last_days: i64,
    tz_offset: impl Into<String>,
) -> Result<EventWindow> {
    if period_end.is_some() && period_start.is_none() {
        bail!("--period-end requires --period-start");
    }

    let start = match period_start {
        Some(raw) => parse_date(raw, "--period-start")?,
        None => today - Duration::days(last_days),
    };
    let end = match period_end {
        Some(raw) => parse_date(raw, "--period-end")?,
        None => match period_start {
            Some(_) => start,
            None => today,
        },
    };

    if start > end {
        bail!(
            "period start {} is after period end {}",
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        );
    }

    Ok(EventWindow {
        start_date: start.format(DATE_FORMAT).to_string(),
        end_date: end.format(DATE_FORMAT).to_string(),
        tz_offset: tz_offset.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()
    }

    #[test]
    fn defaults_to_trailing_window_ending_today() {
        let w = resolve_window(None, None, today(), 3, "+07:00").unwrap();
        assert_eq!(w.start_date, "2023-11-11");
        assert_eq!(w.end_date, "2023-11-14");
        assert_eq!(w.tz_offset, "+07:00");
    }

    #[test]
    fn start_alone_is_a_single_day() {
        let w = resolve_window(Some("2023-11-01"), None, today(), 3, "+07:00").unwrap();
        assert_eq!(w.start_date, "2023-11-01");
        assert_eq!(w.end_date, "2023-11-01");
    }

    #[test]
    fn explicit_range_is_respected() {
        let w = resolve_window(
            Some("2023-11-01"),
            Some("2023-11-10"),
            today(),
            3,
            "+07:00",
        )
        .unwrap();
        assert_eq!(w.start_date, "2023-11-01");
        assert_eq!(w.end_date, "2023-11-10");
    }

    #[test]
    fn end_without_start_is_rejected() {
        let err = resolve_window(None, Some("2023-11-10"), today(), 3, "+07:00").unwrap_err();
        assert!(err.to_string().contains("requires --period-start"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = resolve_window(
            Some("2023-11-10"),
            Some("2023-11-01"),
            today(),
            3,
            "+07:00",
        )
        .unwrap_err();
        assert!(err.to_string().contains("after period end"));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(resolve_window(Some("11/01/2023"), None, today(), 3, "+07:00").is_err());
        assert!(resolve_window(Some("2023-11-01"), Some("soon"), today(), 3, "+07:00").is_err());
    }
}

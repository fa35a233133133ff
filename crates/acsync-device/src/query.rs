//! Request-body builder for the device's access-control event search.

use crate::EventWindow;
use serde::Serialize;
use uuid::Uuid;

/// Envelope the ISAPI event-search endpoint expects.
#[derive(Debug, Clone, Serialize)]
pub struct AcsEventSearch {
    #[serde(rename = "AcsEventCond")]
    pub cond: AcsEventCond,
}

/// Search condition: one logical search (stable `searchID`) windowed to a
/// date range and advanced page by page via `searchResultPosition`.
#[derive(Debug, Clone, Serialize)]
pub struct AcsEventCond {
    #[serde(rename = "searchID")]
    pub search_id: String,
    #[serde(rename = "maxResults")]
    pub max_results: u32,
    #[serde(rename = "searchResultPosition")]
    pub search_result_position: u64,
    pub major: u32,
    pub minor: u32,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
}

/// Build the search body for one page.
///
/// `search_id` must be the same UUID across all pages of one device's
/// search — the device uses it to keep the search cursor coherent. The
/// `major`/`minor` pair is left at 0/0, the wildcard event-type filter.
pub fn event_search_body(
    search_id: &Uuid,
    page_size: u32,
    offset: u64,
    window: &EventWindow,
) -> AcsEventSearch {
    AcsEventSearch {
        cond: AcsEventCond {
            search_id: search_id.to_string(),
            max_results: page_size,
            search_result_position: offset,
            major: 0,
            minor: 0,
            start_time: format!("{}T00:00:00{}", window.start_date, window.tz_offset),
            end_time: format!("{}T23:59:59{}", window.end_date, window.tz_offset),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> EventWindow {
        EventWindow {
            start_date: "2023-11-01".to_string(),
            end_date: "2023-11-14".to_string(),
            tz_offset: "+07:00".to_string(),
        }
    }

    #[test]
    fn body_serializes_to_the_wire_shape() {
        let id = Uuid::new_v4();
        let body = event_search_body(&id, 24, 48, &window());
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "AcsEventCond": {
                    "searchID": id.to_string(),
                    "maxResults": 24,
                    "searchResultPosition": 48,
                    "major": 0,
                    "minor": 0,
                    "startTime": "2023-11-01T00:00:00+07:00",
                    "endTime": "2023-11-14T23:59:59+07:00",
                }
            })
        );
    }

    #[test]
    fn window_covers_whole_days_in_device_local_time() {
        let id = Uuid::new_v4();
        let mut w = window();
        w.tz_offset = "-04:00".to_string();
        let body = event_search_body(&id, 10, 0, &w);
        assert_eq!(body.cond.start_time, "2023-11-01T00:00:00-04:00");
        assert_eq!(body.cond.end_time, "2023-11-14T23:59:59-04:00");
    }
}

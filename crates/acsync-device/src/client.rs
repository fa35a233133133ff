//! Concrete device client over the digest transport.

use crate::info::device_name_from_xml;
use crate::query::event_search_body;
use crate::{DeviceEvent, DeviceGateway, EventPage, EventWindow};
use acsync_digest::{ChallengeContext, DeviceCredentials, DigestClient};
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

const DEVICE_INFO_PATH: &str = "/ISAPI/System/deviceInfo";
const ACS_EVENT_PATH: &str = "/ISAPI/AccessControl/AcsEvent?format=json";

/// Label used when a device's metadata carries no display name.
const UNKNOWN_DEVICE: &str = "Unknown Device";

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AcsEventResponse {
    #[serde(rename = "AcsEvent")]
    acs_event: AcsEventBody,
}

#[derive(Debug, Deserialize)]
struct AcsEventBody {
    #[serde(rename = "totalMatches", default)]
    total_matches: u64,
    #[serde(rename = "InfoList", default)]
    info_list: Option<Vec<DeviceEvent>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One device's client. Owns the digest challenge context for its whole
/// lifetime, so constructing a fresh `DeviceClient` per device guarantees
/// the no-carry-over rule between devices.
#[derive(Debug)]
pub struct DeviceClient {
    digest: DigestClient,
    context: ChallengeContext,
}

impl DeviceClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let digest = DigestClient::new(base_url, DeviceCredentials::new(username, password))
            .with_context(|| format!("failed to build digest client for {base_url}"))?;
        Ok(Self {
            digest,
            context: ChallengeContext::new(),
        })
    }

    /// Build over a pre-configured digest client (tests).
    pub fn with_digest_client(digest: DigestClient) -> Self {
        Self {
            digest,
            context: ChallengeContext::new(),
        }
    }
}

#[async_trait::async_trait]
impl DeviceGateway for DeviceClient {
    fn endpoint(&self) -> &str {
        self.digest.base_url()
    }

    async fn device_name(&mut self) -> Result<String> {
        let response = self
            .digest
            .get(&mut self.context, DEVICE_INFO_PATH)
            .await
            .context("device info request failed")?;
        let xml = response.text().context("device info body decode failed")?;
        Ok(device_name_from_xml(&xml).unwrap_or_else(|| UNKNOWN_DEVICE.to_string()))
    }

    async fn events_page(
        &mut self,
        search_id: &Uuid,
        page_size: u32,
        offset: u64,
        window: &EventWindow,
    ) -> Result<EventPage> {
        let body = event_search_body(search_id, page_size, offset, window);
        debug!(endpoint = %self.digest.base_url(), offset, "fetching event page");
        let response = self
            .digest
            .post_json(&mut self.context, ACS_EVENT_PATH, &body)
            .await
            .context("event search request failed")?;
        let decoded: AcsEventResponse = response
            .json()
            .context("event search response decode failed")?;
        Ok(EventPage {
            total_matches: decoded.acs_event.total_matches,
            events: decoded.acs_event.info_list,
        })
    }

    async fn picture(&mut self, picture_url: &str) -> Result<Vec<u8>> {
        // Devices report absolute picture URLs; the digest client wants a
        // path relative to its own base.
        let path = picture_url
            .strip_prefix(self.digest.base_url())
            .unwrap_or(picture_url);
        let response = self
            .digest
            .get(&mut self.context, path)
            .await
            .with_context(|| format!("picture fetch failed for {path}"))?;
        Ok(response.into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests (httpmock; full digest negotiation against a fake device)
// ---------------------------------------------------------------------------

//! Multipart punch submission.

use crate::AttendanceClient;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::multipart::{Form, Part};

/// 1×1 transparent PNG attached to punches whose device event carried no
/// picture URL — the submission endpoint requires a photo part.
const PLACEHOLDER_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Photo payload for one punch.
#[derive(Debug, Clone)]
pub struct PunchPhoto {
    pub bytes: Vec<u8>,
    pub file_name: &'static str,
    pub mime: &'static str,
}

impl PunchPhoto {
    /// A JPEG captured by the device.
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: "photo.jpg",
            mime: "image/jpeg",
        }
    }

    /// The built-in placeholder for events without a picture.
    pub fn placeholder() -> Result<Self> {
        let bytes = STANDARD
            .decode(PLACEHOLDER_PNG_BASE64)
            .context("embedded placeholder png is not valid base64")?;
        Ok(Self {
            bytes,
            file_name: "photo.png",
            mime: "image/png",
        })
    }
}

/// One reconciled punch ready for submission.
#[derive(Debug, Clone)]
pub struct PunchRecord {
    /// Device-reported event time, passed through verbatim.
    pub date_time: String,
    pub employee_id: String,
    /// Display name of the device that produced the event.
    pub gate_name: String,
    pub photo: PunchPhoto,
}

/// Submission boundary used by the reconciliation driver.
#[async_trait::async_trait]
pub trait PunchSink: Send + Sync {
    /// Submit one punch. Failures are per-record: the driver logs and
    /// moves on without aborting the device.
    async fn submit(&self, punch: PunchRecord) -> Result<()>;
}

#[async_trait::async_trait]
impl PunchSink for AttendanceClient {
    async fn submit(&self, punch: PunchRecord) -> Result<()> {
        let token = self.token.bearer_token().await?;

        let photo = Part::bytes(punch.photo.bytes)
            .file_name(punch.photo.file_name)
            .mime_str(punch.photo.mime)
            .context("invalid photo mime type")?;
        let form = Form::new()
            .part("photo", photo)
            .text("date_time", punch.date_time)
            .text("employee_id", punch.employee_id)
            .text("gate_name", punch.gate_name);

        let response = self
            .http
            .post(&self.submit_url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .context("punch submission request failed")?;

        if !response.status().is_success() {
            bail!(
                "punch submission returned status {}",
                response.status().as_u16()
            );
        }
        Ok(())
    }
}

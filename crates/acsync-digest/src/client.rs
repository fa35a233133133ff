//! Digest HTTP client: one logical request per call, with 401
//! challenge/response negotiation and bounded retry handled internally.
//!
//! The caller threads a `&mut ChallengeContext` through every call for a
//! given device; the context is the only negotiation state and it must
//! never be shared between devices.

use crate::auth::{self, ChallengeContext, DeviceCredentials};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Shared attempt budget for one logical request: 401 renegotiations and
/// transient transport retries both consume from it.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced by [`DigestClient`].
#[derive(Debug)]
pub enum DigestError {
    /// The client itself could not be constructed or a body could not be
    /// encoded.
    Config(String),
    /// Network or transport failure that survived the retry budget.
    Transport(String),
    /// The server answered with a fatal (non-2xx, non-401) status.
    Http { status: u16 },
    /// A response body could not be decoded as requested.
    Decode(String),
    /// The attempt budget was exhausted by 401 renegotiation cycles. This
    /// is distinct from [`DigestError::Http`] so operators can tell
    /// authentication-negotiation failures from downstream failures.
    RetriesExhausted { attempts: u32 },
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestError::Config(msg) => write!(f, "digest client config error: {msg}"),
            DigestError::Transport(msg) => write!(f, "transport error: {msg}"),
            DigestError::Http { status } => write!(f, "request failed with status {status}"),
            DigestError::Decode(msg) => write!(f, "decode error: {msg}"),
            DigestError::RetriesExhausted { attempts } => {
                write!(f, "digest negotiation exhausted after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for DigestError {}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A successful (2xx) response: status, headers and the raw body, with
/// typed accessors for the decodings callers actually use.
#[derive(Debug)]
pub struct DigestResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl DigestResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    pub fn text(&self) -> Result<String, DigestError> {
        String::from_utf8(self.body.clone())
            .map_err(|e| DigestError::Decode(format!("response body is not utf-8: {e}")))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DigestError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| DigestError::Decode(format!("response body is not valid json: {e}")))
    }
}

/// Outcome of a single attempt inside the retry loop.
enum AttemptOutcome {
    Success(DigestResponse),
    /// 401; the challenge header value when the server sent one.
    Unauthorized(Option<String>),
    /// Transport-level failure treated as transient.
    Transient(String),
    /// Fatal non-2xx status; not retryable.
    Fatal(u16),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for one digest-authenticated device endpoint.
///
/// The client itself is stateless between calls; all negotiation state
/// lives in the [`ChallengeContext`] the caller passes in.
#[derive(Debug, Clone)]
pub struct DigestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: DeviceCredentials,
}

impl DigestClient {
    /// Build a client for a device base URL. Devices commonly sit on the
    /// LAN behind self-signed certificates, so TLS verification is off for
    /// this transport.
    pub fn new(
        base_url: impl Into<String>,
        credentials: DeviceCredentials,
    ) -> Result<Self, DigestError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| DigestError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self::with_http_client(base_url, credentials, http))
    }

    /// Build with a pre-built `reqwest::Client` (tests).
    pub fn with_http_client(
        base_url: impl Into<String>,
        credentials: DeviceCredentials,
        http: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET with the default attempt budget.
    pub async fn get(
        &self,
        context: &mut ChallengeContext,
        path: &str,
    ) -> Result<DigestResponse, DigestError> {
        self.perform(context, Method::GET, path, None, &[], DEFAULT_MAX_ATTEMPTS)
            .await
    }

    /// POST a JSON body with the default attempt budget.
    pub async fn post_json<B: Serialize>(
        &self,
        context: &mut ChallengeContext,
        path: &str,
        body: &B,
    ) -> Result<DigestResponse, DigestError> {
        let body = serde_json::to_value(body)
            .map_err(|e| DigestError::Config(format!("request body encode failed: {e}")))?;
        self.perform(
            context,
            Method::POST,
            path,
            Some(&body),
            &[],
            DEFAULT_MAX_ATTEMPTS,
        )
        .await
    }

    /// Perform one logical request, negotiating digest challenges and
    /// retrying transient transport failures inside a shared attempt
    /// budget.
    ///
    /// Per attempt:
    /// 1. generate the auth header from the current context; a non-empty
    ///    header consumes the nonce count immediately, even if the request
    ///    later fails in flight;
    /// 2. 2xx returns; 401 refreshes (or blanks) the challenge state and
    ///    retries; any other status is fatal; transport failures retry with
    ///    the context untouched.
    pub async fn perform(
        &self,
        context: &mut ChallengeContext,
        method: Method,
        path: &str,
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
        max_attempts: u32,
    ) -> Result<DigestResponse, DigestError> {
        let mut attempt: u32 = 0;

        while attempt < max_attempts {
            let auth_header =
                auth::generate_header(&self.credentials, context, method.as_str(), path, context.nonce_count);
            if !auth_header.is_empty() {
                context.nonce_count += 1;
            }

            match self
                .attempt_once(&method, path, body, extra_headers, &auth_header)
                .await
            {
                AttemptOutcome::Success(response) => {
                    if attempt > 0 {
                        debug!(path, attempts = attempt + 1, "request succeeded after retries");
                    }
                    return Ok(response);
                }
                AttemptOutcome::Unauthorized(challenge) => {
                    match challenge {
                        Some(header) => {
                            context.apply_challenge(&auth::parse_challenge(&header));
                        }
                        None => {
                            // The server refused us without telling us how to
                            // authenticate. Blank the context so the next
                            // attempt probes unauthenticated and re-elicits a
                            // challenge.
                            warn!(
                                base_url = %self.base_url,
                                path,
                                "401 without WWW-Authenticate; resetting challenge state"
                            );
                            context.reset();
                        }
                    }
                    attempt += 1;
                }
                AttemptOutcome::Transient(msg) => {
                    if attempt + 1 >= max_attempts {
                        return Err(DigestError::Transport(msg));
                    }
                    debug!(path, attempt = attempt + 1, error = %msg, "transient transport failure, retrying");
                    attempt += 1;
                }
                AttemptOutcome::Fatal(status) => {
                    return Err(DigestError::Http { status });
                }
            }
        }

        Err(DigestError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    async fn attempt_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
        auth_header: &str,
    ) -> AttemptOutcome {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);

        let mut has_content_type = false;
        for (name, value) in extra_headers {
            if name.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            request = request.header(*name, *value);
        }
        if !auth_header.is_empty() {
            request = request.header(AUTHORIZATION, auth_header);
        }
        if let Some(body) = body {
            if !has_content_type {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body.to_string());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::Transient(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            let headers = response.headers().clone();
            return match response.bytes().await {
                Ok(bytes) => AttemptOutcome::Success(DigestResponse {
                    status: status.as_u16(),
                    headers,
                    body: bytes.to_vec(),
                }),
                Err(e) => AttemptOutcome::Transient(e.to_string()),
            };
        }

        if status == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return AttemptOutcome::Unauthorized(challenge);
        }

        AttemptOutcome::Fatal(status.as_u16())
    }
}

// ---------------------------------------------------------------------------
// Tests (httpmock; no real devices)
// ---------------------------------------------------------------------------

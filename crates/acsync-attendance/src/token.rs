//! OAuth bearer-token acquisition with in-memory caching.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Token endpoint configuration.
#[derive(Clone)]
pub struct TokenConfig {
    pub grant_type: String,
    pub client_id: i64,
    pub client_secret: String,
    pub token_url: String,
    /// The cached token is refreshed this many seconds before its reported
    /// expiry so a token never goes stale mid-request.
    pub refresh_margin_secs: i64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_url", &self.token_url)
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: i64,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    /// Unix seconds.
    expires_at: i64,
}

/// Supplies bearer tokens, fetching a new one only when the cached token
/// is within the refresh margin of expiry. Token-endpoint failures are
/// fatal to the run and propagate to the caller.
#[derive(Debug)]
pub struct TokenProvider {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    /// Client-credentials grant against a token endpoint.
    OAuth {
        config: TokenConfig,
        http: reqwest::Client,
        cached: RwLock<Option<CachedToken>>,
    },
    /// Fixed token (tests).
    Static(String),
}

impl TokenProvider {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            inner: Inner::OAuth {
                config,
                http: reqwest::Client::new(),
                cached: RwLock::new(None),
            },
        }
    }

    pub fn with_static_token(token: impl Into<String>) -> Self {
        Self {
            inner: Inner::Static(token.into()),
        }
    }

    /// Current bearer token, from cache when still comfortably valid.
    pub async fn bearer_token(&self) -> Result<String> {
        let (config, http, cached) = match &self.inner {
            Inner::Static(token) => return Ok(token.clone()),
            Inner::OAuth {
                config,
                http,
                cached,
            } => (config, http, cached),
        };

        let now = Utc::now().timestamp();
        {
            let guard = cached.read().await;
            if let Some(token) = guard.as_ref() {
                if now < token.expires_at - config.refresh_margin_secs {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let response = http
            .post(&config.token_url)
            .json(&TokenRequest {
                grant_type: &config.grant_type,
                client_id: config.client_id,
                client_secret: &config.client_secret,
            })
            .send()
            .await
            .context("token request failed")?;

        if !response.status().is_success() {
            bail!(
                "token endpoint returned status {}",
                response.status().as_u16()
            );
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("token response decode failed")?;

        let token = CachedToken {
            access_token: body.access_token,
            expires_at: now + body.expires_in,
        };
        let access_token = token.access_token.clone();
        *cached.write().await = Some(token);
        Ok(access_token)
    }
}

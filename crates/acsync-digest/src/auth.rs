//! Pure digest-authentication math: HA1/HA2/response hashes, header
//! generation and `WWW-Authenticate` challenge parsing.
//!
//! Everything in this module is deterministic given its inputs except the
//! client nonce, which is freshly random per generated header.

use md5::{Digest, Md5};
use rand::RngCore;

// ---------------------------------------------------------------------------
// Credentials + challenge state
// ---------------------------------------------------------------------------

/// Username/password pair for one device.
#[derive(Clone)]
pub struct DeviceCredentials {
    pub username: String,
    pub password: String,
}

impl DeviceCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Mutable digest negotiation state for one device.
///
/// One instance per device per run. The nonce counter reflects the next
/// unused value: it is incremented the moment a header is generated, before
/// the request is issued, so a request that fails in flight still consumes
/// its count (digest servers are strict about monotonic counters).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeContext {
    pub realm: String,
    pub nonce: String,
    pub qop: String,
    pub opaque: String,
    pub nonce_count: u32,
}

impl ChallengeContext {
    /// A blank context: no challenge received yet. The first request must
    /// go out unauthenticated to elicit one.
    pub fn new() -> Self {
        Self {
            realm: String::new(),
            nonce: String::new(),
            qop: "auth".to_string(),
            opaque: String::new(),
            nonce_count: 1,
        }
    }

    /// Reset to the blank state, forcing an unauthenticated probe on the
    /// next attempt.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Overlay a parsed challenge. Only fields the server actually sent are
    /// applied; a partial challenge never clobbers previously-known state.
    pub fn apply_challenge(&mut self, fields: &ChallengeFields) {
        if let Some(realm) = &fields.realm {
            self.realm = realm.clone();
        }
        if let Some(nonce) = &fields.nonce {
            self.nonce = nonce.clone();
        }
        if let Some(qop) = &fields.qop {
            self.qop = qop.clone();
        }
        if let Some(opaque) = &fields.opaque {
            self.opaque = opaque.clone();
        }
    }
}

impl Default for ChallengeContext {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Hashes
// ---------------------------------------------------------------------------

fn md5_hex(value: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// HA1 = MD5(username:realm:password).
pub fn ha1(username: &str, realm: &str, password: &str) -> String {
    md5_hex(&format!("{username}:{realm}:{password}"))
}

/// HA2 = MD5(method:uri).
pub fn ha2(method: &str, uri: &str) -> String {
    md5_hex(&format!("{method}:{uri}"))
}

/// Response = MD5(HA1:nonce:nc:cnonce:qop:HA2), with `nc` already rendered
/// as an 8-digit zero-padded decimal.
pub fn digest_response(
    ha1: &str,
    nonce: &str,
    nc: &str,
    cnonce: &str,
    qop: &str,
    ha2: &str,
) -> String {
    md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"))
}

fn client_nonce() -> String {
    let mut buf = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

// ---------------------------------------------------------------------------
// Header generation
// ---------------------------------------------------------------------------

/// Generate the `Digest ...` Authorization header value.
///
/// Returns the empty string when the context carries no nonce yet — the
/// caller must send that first request unauthenticated to elicit a
/// challenge. The caller owns the nonce counter and passes the value to
/// render; incrementing it is the caller's job.
pub fn generate_header(
    credentials: &DeviceCredentials,
    context: &ChallengeContext,
    method: &str,
    uri: &str,
    nonce_count: u32,
) -> String {
    if context.nonce.is_empty() {
        return String::new();
    }

    let ha1 = ha1(&credentials.username, &context.realm, &credentials.password);
    let ha2 = ha2(method, uri);
    let nc = format!("{nonce_count:08}");
    let cnonce = client_nonce();
    let response = digest_response(&ha1, &context.nonce, &nc, &cnonce, &context.qop, &ha2);

    format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", qop={}, nc={}, cnonce=\"{}\", opaque=\"{}\"",
        credentials.username, context.realm, context.nonce, uri, response, context.qop, nc, cnonce, context.opaque,
    )
}

// ---------------------------------------------------------------------------
// Challenge parsing
// ---------------------------------------------------------------------------

/// Fields extracted from a `WWW-Authenticate` digest challenge. Absent keys
/// stay `None`; the parser never injects defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeFields {
    pub realm: Option<String>,
    pub nonce: Option<String>,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub stale: Option<String>,
    pub domain: Option<String>,
}

/// Extract quoted `key="value"` pairs from a digest challenge header.
///
/// Order-independent and tolerant: unrecognized keys are skipped, malformed
/// tail input stops the scan without corrupting already-extracted fields,
/// and nothing here can panic on arbitrary input.
pub fn parse_challenge(header: &str) -> ChallengeFields {
    let mut fields = ChallengeFields::default();
    let bytes = header.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let key = &header[start..i];

        // Expect `="value"` immediately after the key; anything else means
        // this token is not a quoted pair (e.g. `qop=auth` unquoted) and is
        // skipped.
        if bytes.get(i) != Some(&b'=') || bytes.get(i + 1) != Some(&b'"') {
            continue;
        }
        let value_start = i + 2;
        let Some(rel_end) = header[value_start..].find('"') else {
            // Unterminated quote: stop scanning, keep what we have.
            break;
        };
        let value = &header[value_start..value_start + rel_end];
        i = value_start + rel_end + 1;

        let slot = match key {
            "realm" => &mut fields.realm,
            "nonce" => &mut fields.nonce,
            "qop" => &mut fields.qop,
            "opaque" => &mut fields.opaque,
            "stale" => &mut fields.stale,
            "domain" => &mut fields.domain,
            _ => continue,
        };
        *slot = Some(value.to_string());
    }

    fields
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc2617_context() -> ChallengeContext {
        ChallengeContext {
            realm: "testrealm@host.com".to_string(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            qop: "auth".to_string(),
            opaque: "5ccc069c403ebaf9f0171e9517f40e41".to_string(),
            nonce_count: 1,
        }
    }

    #[test]
    fn rfc2617_worked_example_response_hash() {
        // The worked example from RFC 2617 section 3.5.
        let h1 = ha1("Mufasa", "testrealm@host.com", "Circle Of Life");
        let h2 = ha2("GET", "/dir/index.html");
        let response = digest_response(
            &h1,
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            "00000001",
            "0a4f113b",
            "auth",
            &h2,
        );
        assert_eq!(response, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn header_wire_format_matches_rfc2617_convention() {
        let creds = DeviceCredentials::new("Mufasa", "Circle Of Life");
        let ctx = rfc2617_context();
        let header = generate_header(&creds, &ctx, "GET", "/dir/index.html", 1);

        assert!(header.starts_with(
            "Digest username=\"Mufasa\", realm=\"testrealm@host.com\", \
             nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", uri=\"/dir/index.html\", response=\""
        ));
        assert!(header.contains(", qop=auth, nc=00000001, cnonce=\""));
        assert!(header.ends_with("\", opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""));

        // The embedded response hash must verify against the cnonce the
        // header itself carries.
        let cnonce = extract(&header, "cnonce");
        let response = extract(&header, "response");
        let h1 = ha1("Mufasa", "testrealm@host.com", "Circle Of Life");
        let h2 = ha2("GET", "/dir/index.html");
        assert_eq!(
            response,
            digest_response(&h1, &ctx.nonce, "00000001", &cnonce, "auth", &h2)
        );
    }

    fn extract(header: &str, key: &str) -> String {
        let needle = format!("{key}=\"");
        let start = header.find(&needle).unwrap() + needle.len();
        let end = header[start..].find('"').unwrap();
        header[start..start + end].to_string()
    }

    #[test]
    fn empty_nonce_yields_empty_header() {
        let creds = DeviceCredentials::new("admin", "secret");
        let ctx = ChallengeContext::new();
        assert_eq!(generate_header(&creds, &ctx, "GET", "/x", 1), "");
    }

    #[test]
    fn nc_renders_zero_padded_and_increases() {
        let creds = DeviceCredentials::new("admin", "secret");
        let ctx = rfc2617_context();

        let first = generate_header(&creds, &ctx, "GET", "/x", 1);
        let second = generate_header(&creds, &ctx, "GET", "/x", 2);
        assert!(first.contains("nc=00000001"));
        assert!(second.contains("nc=00000002"));

        // Fresh randomness per header.
        assert_ne!(extract(&first, "cnonce"), extract(&second, "cnonce"));
    }

    #[test]
    fn parse_challenge_extracts_all_known_keys() {
        let fields = parse_challenge(
            "Digest qop=\"auth\", realm=\"IP Camera\", nonce=\"abc123\", \
             stale=\"FALSE\", opaque=\"xyz\", domain=\"/ISAPI\"",
        );
        assert_eq!(fields.qop.as_deref(), Some("auth"));
        assert_eq!(fields.realm.as_deref(), Some("IP Camera"));
        assert_eq!(fields.nonce.as_deref(), Some("abc123"));
        assert_eq!(fields.stale.as_deref(), Some("FALSE"));
        assert_eq!(fields.opaque.as_deref(), Some("xyz"));
        assert_eq!(fields.domain.as_deref(), Some("/ISAPI"));
    }

    #[test]
    fn parse_challenge_leaves_absent_keys_none() {
        let fields = parse_challenge("Digest realm=\"IP Camera\", nonce=\"abc123\"");
        assert_eq!(fields.realm.as_deref(), Some("IP Camera"));
        assert_eq!(fields.nonce.as_deref(), Some("abc123"));
        assert!(fields.qop.is_none());
        assert!(fields.opaque.is_none());
        assert!(fields.stale.is_none());
        assert!(fields.domain.is_none());
    }

    #[test]
    fn parse_challenge_is_order_independent() {
        let fields = parse_challenge("Digest nonce=\"n\", opaque=\"o\", realm=\"r\"");
        assert_eq!(fields.realm.as_deref(), Some("r"));
        assert_eq!(fields.nonce.as_deref(), Some("n"));
        assert_eq!(fields.opaque.as_deref(), Some("o"));
    }

    #[test]
    fn parse_challenge_survives_malformed_input() {
        // Unterminated quote after a valid pair: the valid pair survives.
        let fields = parse_challenge("Digest realm=\"r\", nonce=\"broken");
        assert_eq!(fields.realm.as_deref(), Some("r"));
        assert!(fields.nonce.is_none());

        // Garbage input extracts nothing and does not panic.
        assert_eq!(parse_challenge(""), ChallengeFields::default());
        assert_eq!(parse_challenge("?????===\"\"\""), ChallengeFields::default());
    }

    #[test]
    fn parse_challenge_ignores_unquoted_and_unknown_pairs() {
        let fields = parse_challenge("Digest qop=auth, algorithm=\"MD5\", nonce=\"n\"");
        // Unquoted qop is skipped; unknown algorithm key is skipped.
        assert!(fields.qop.is_none());
        assert_eq!(fields.nonce.as_deref(), Some("n"));
    }

    #[test]
    fn apply_challenge_overlays_only_present_fields() {
        let mut ctx = ChallengeContext {
            realm: "old-realm".to_string(),
            nonce: "old-nonce".to_string(),
            qop: "auth".to_string(),
            opaque: "old-opaque".to_string(),
            nonce_count: 5,
        };
        ctx.apply_challenge(&ChallengeFields {
            nonce: Some("new-nonce".to_string()),
            ..ChallengeFields::default()
        });
        assert_eq!(ctx.nonce, "new-nonce");
        assert_eq!(ctx.realm, "old-realm");
        assert_eq!(ctx.opaque, "old-opaque");
        assert_eq!(ctx.nonce_count, 5);
    }

    #[test]
    fn reset_returns_to_blank_state() {
        let mut ctx = rfc2617_context();
        ctx.nonce_count = 7;
        ctx.reset();
        assert_eq!(ctx, ChallengeContext::new());
        assert_eq!(ctx.nonce_count, 1);
        assert_eq!(ctx.qop, "auth");
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = DeviceCredentials::new("admin", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}

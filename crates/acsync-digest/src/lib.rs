//! acsync-digest
//!
//! RFC 2617 Digest authentication for ISAPI access-control devices.
//!
//! Two layers live here:
//! - `auth`: pure header math (HA1/HA2/response), header generation and
//!   `WWW-Authenticate` challenge parsing. No IO.
//! - `client`: a reqwest-backed HTTP client that drives the 401
//!   challenge/response negotiation and bounded retry over a mutable
//!   per-device [`ChallengeContext`].
//!
//! The challenge context is deliberately external to the pure functions:
//! one context per device, threaded `&mut` through every request so the
//! nonce counter stays monotonic across a device's whole page sequence.

pub mod auth;
pub mod client;

pub use auth::{parse_challenge, ChallengeContext, ChallengeFields, DeviceCredentials};
pub use client::{DigestClient, DigestError, DigestResponse, DEFAULT_MAX_ATTEMPTS};

//! Access-key handling for hardened deployments.
//!
//! When the backend is configured with access keys, every request must carry
//! one in the `X-NginxPulse-Key` header, and a missing or wrong key yields a
//! 401. This module provides the two seams the transport needs:
//!
//! - [`CredentialProvider`]: where the key comes from. Read on every request,
//!   so a key saved by `pulse key set` is picked up without rebuilding the
//!   client.
//! - [`AuthNotifier`]: who hears about a 401, so a front end can prompt for a
//!   new key.

mod observer;
mod store;

use std::fmt;

pub use observer::{AuthNotifier, AuthObserver, AuthRequired, SubscriptionId};
pub use store::FileCredentialStore;

/// Header the backend reads the access key from.
pub const ACCESS_KEY_HEADER: &str = "X-NginxPulse-Key";

/// Source of the access key attached to outgoing requests.
pub trait CredentialProvider: fmt::Debug + Send + Sync {
    /// Current key, or `None` when requests should go out unauthenticated.
    fn access_key(&self) -> Option<String>;
}

/// No key; requests go out without the access-key header.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredential;

impl CredentialProvider for NoCredential {
    fn access_key(&self) -> Option<String> {
        None
    }
}

/// A fixed key, e.g. from `PULSE_ACCESS_KEY`.
#[derive(Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticCredential(***)")
    }
}

impl CredentialProvider for StaticCredential {
    fn access_key(&self) -> Option<String> {
        clean_key(&self.0)
    }
}

/// Trim a raw key; blank keys count as no key.
pub(crate) fn clean_key(raw: &str) -> Option<String> {
    let key = raw.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

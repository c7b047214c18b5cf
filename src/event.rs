//! Signed Nostr events and event templates.
//!
//! Cryptography stays outside this crate: verification is injected as a
//! [`VerifyEvent`] callback and signing is delegated to the caller. The only
//! structural requirement is that `id` is the content hash of the canonical
//! serialization and `sig` is a signature over `id`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Event kind used for NIP-42 relay authentication.
pub const KIND_CLIENT_AUTH: u16 = 22242;

/// A signed Nostr event as exchanged with relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-bytes lowercase hex-encoded sha256 of the serialized event data
    pub id: String,
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind (integer between 0 and 65535)
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// 64-bytes lowercase hex signature
    pub sig: String,
}

/// An unsigned event body, handed to a signer to produce an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
}

/// Signature verification callback injected into connections and pools.
///
/// Returns `true` iff the event's `id` matches its content hash and `sig`
/// verifies against `id` and `pubkey`.
pub type VerifyEvent = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Verifier that accepts every event, used for pre-trusted relays.
pub fn always_verified() -> VerifyEvent {
    Arc::new(|_| true)
}

/// Build the unsigned NIP-42 authentication event binding a relay url to the
/// challenge it issued.
pub fn make_auth_event(relay_url: &str, challenge: &str) -> EventTemplate {
    EventTemplate {
        kind: KIND_CLIENT_AUTH,
        created_at: unix_now(),
        tags: vec![
            vec!["relay".to_string(), relay_url.to_string()],
            vec!["challenge".to_string(), challenge.to_string()],
        ],
        content: String::new(),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

//! Nostr relay client: single connections and multi-relay pools.
//!
//! [`RelayConnection`] manages one WebSocket connection to one relay:
//! subscriptions with per-event callbacks, publish and COUNT request
//! correlation, NIP-42 authentication, and ordered inbound dispatch.
//! [`RelayPool`] fans those operations out across relay sets with one shared
//! connection per relay, cross-relay event deduplication, and aggregated
//! end-of-stored-events signals.
//!
//! Cryptography is injected: callers supply a [`VerifyEvent`] callback for
//! signature checks and a signing closure for authentication, so this crate
//! carries no key material.
//!
//! ```no_run
//! use nostr_pool::{Event, Filter, PoolSubscribeParams, RelayPool};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let pool = RelayPool::new(Arc::new(|_event: &Event| true));
//!
//! let sub = pool.subscribe_many(
//!     vec![
//!         "wss://relay.example.com".to_string(),
//!         "wss://other.example.com".to_string(),
//!     ],
//!     vec![Filter::new().kinds(vec![1]).limit(20)],
//!     PoolSubscribeParams {
//!         on_event: Some(Arc::new(|event: Event| println!("{}", event.content))),
//!         on_eose: Some(Box::new(|| println!("caught up"))),
//!         ..Default::default()
//!     },
//! );
//! # sub.close().await;
//! # }
//! ```

pub mod error;
pub mod event;
pub mod filter;
pub mod message;
pub mod pool;
mod queue;
pub mod relay;
pub mod subscription;
pub mod url;

pub use error::{RelayError, Result};
pub use event::{
    always_verified, make_auth_event, Event, EventTemplate, VerifyEvent, KIND_CLIENT_AUTH,
};
pub use filter::{matches_any, Filter};
pub use message::{ClientMessage, MessageError, RelayMessage};
pub use pool::{PoolCloseCallback, PoolSubscribeParams, PoolSubscription, RelayPool};
pub use relay::{RelayConfig, RelayConnection, SubscriptionHandle};
pub use subscription::{
    AlreadyHaveCallback, CloseCallback, EventCallback, OnceCallback, ReceivedEventCallback,
    SubscribeParams,
};
pub use url::normalize_relay_url;

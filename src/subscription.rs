//! Subscription records and callback surfaces.
//!
//! A subscription is one live query registered with one relay connection. It
//! is owned by the connection that created it and looked up by id on dispatch;
//! callers interact with it through the handle returned by
//! [`RelayConnection::subscribe`](crate::RelayConnection::subscribe).

use crate::event::Event;
use crate::filter::Filter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Per-event observation callback.
pub type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// Callback fired at most once (end-of-stored-events).
pub type OnceCallback = Box<dyn FnOnce() + Send>;

/// Close callback carrying the close reason.
pub type CloseCallback = Box<dyn FnOnce(String) + Send>;

/// Deduplication predicate: returns true if the event id was already seen and
/// delivery should be suppressed.
pub type AlreadyHaveCallback = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Liveness observer invoked with `(relay_url, event_id)` for every event a
/// connection delivers, including deliveries suppressed by deduplication.
pub type ReceivedEventCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Parameters for [`RelayConnection::subscribe`](crate::RelayConnection::subscribe).
#[derive(Default)]
pub struct SubscribeParams {
    /// Subscription id; a fresh `sub:<serial>` id is generated when absent.
    pub id: Option<String>,
    /// Invoked for every verified, filter-matching, not-yet-seen event.
    pub on_event: Option<EventCallback>,
    /// Invoked exactly once on end-of-stored-events, by signal or timeout.
    pub on_eose: Option<OnceCallback>,
    /// Invoked when the subscription closes, with the close reason.
    pub on_close: Option<CloseCallback>,
    /// Already-seen predicate consulted before delivery.
    pub already_have: Option<AlreadyHaveCallback>,
    /// Observer for every delivery attempt on this connection.
    pub received_event: Option<ReceivedEventCallback>,
    /// Deadline for forcing end-of-stored-events locally; the connection's
    /// configured default applies when absent.
    pub eose_timeout: Option<Duration>,
}

/// One live query registered with one relay connection.
pub(crate) struct Subscription {
    pub id: String,
    pub filters: Vec<Filter>,
    pub eosed: bool,
    pub on_event: Option<EventCallback>,
    pub on_eose: Option<OnceCallback>,
    pub on_close: Option<CloseCallback>,
    pub already_have: Option<AlreadyHaveCallback>,
    pub received_event: Option<ReceivedEventCallback>,
    pub eose_timer: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(id: String, filters: Vec<Filter>, params: SubscribeParams) -> Self {
        Self {
            id,
            filters,
            eosed: false,
            on_event: params.on_event,
            on_eose: params.on_eose,
            on_close: params.on_close,
            already_have: params.already_have,
            received_event: params.received_event,
            eose_timer: None,
        }
    }

    /// Stop the EOSE deadline timer, if still pending.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.eose_timer.take() {
            timer.abort();
        }
    }
}

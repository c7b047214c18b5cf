//! Single relay connection management.
//!
//! A [`RelayConnection`] owns one WebSocket connection to one relay and
//! multiplexes subscriptions and correlated request/response exchanges over
//! it. Inbound frames are queued and drained by a single dispatch task that
//! yields between messages, so per-connection processing is strictly ordered
//! and one burst cannot monopolize the scheduler.

use crate::error::{RelayError, Result};
use crate::event::{make_auth_event, Event, EventTemplate, VerifyEvent};
use crate::filter::{matches_any, Filter};
use crate::message::{scan_hex64, scan_subscription_id, ClientMessage, RelayMessage};
use crate::queue::MessageQueue;
use crate::subscription::{SubscribeParams, Subscription};
use crate::url::normalize_relay_url;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

/// Timeouts governing one relay connection.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Deadline for the WebSocket open handshake
    pub connect_timeout: Duration,
    /// Default deadline for forcing end-of-stored-events locally
    pub eose_timeout: Duration,
    /// Deadline for the OK acknowledgement of a published event
    pub publish_timeout: Duration,
    /// Deadline for COUNT replies; COUNT waits until connection close when `None`
    pub count_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(4400),
            eose_timeout: Duration::from_millis(4400),
            publish_timeout: Duration::from_millis(4400),
            count_timeout: None,
        }
    }
}

type NoticeObserver = Arc<dyn Fn(&str) + Send + Sync>;
type AuthObserver = Arc<dyn Fn(&str) + Send + Sync>;
type DisconnectObserver = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Observers {
    on_notice: Option<NoticeObserver>,
    on_auth: Option<AuthObserver>,
    on_disconnect: Option<DisconnectObserver>,
}

type PublishWaiter = oneshot::Sender<Result<String>>;
type CountWaiter = oneshot::Sender<Result<u64>>;

/// Mutable connection state, touched only from the public API entry points and
/// the single dispatch task.
#[derive(Default)]
struct Inner {
    outbound: Option<mpsc::UnboundedSender<String>>,
    queue: Option<Arc<MessageQueue>>,
    io_tasks: Vec<JoinHandle<()>>,
    serial: u64,
    challenge: Option<String>,
    subscriptions: HashMap<String, Subscription>,
    publish_waiters: HashMap<String, PublishWaiter>,
    count_waiters: HashMap<String, CountWaiter>,
}

struct Shared {
    url: String,
    verify: VerifyEvent,
    connected: AtomicBool,
    inner: Mutex<Inner>,
    observers: Mutex<Observers>,
}

/// One persistent connection to one relay.
pub struct RelayConnection {
    config: RelayConfig,
    shared: Arc<Shared>,
    connect_lock: tokio::sync::Mutex<()>,
}

/// Caller-side handle to a registered subscription.
pub struct SubscriptionHandle {
    id: String,
    shared: Arc<Shared>,
}

impl SubscriptionHandle {
    /// The subscription id used on the wire.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cancel the subscription: sends a CLOSE notice if still connected and
    /// fires the close callback with reason `"closed by caller"`.
    pub fn close(&self) {
        self.shared.close_subscription(&self.id, "closed by caller");
    }
}

impl RelayConnection {
    /// Create a connection with default timeouts. Does not connect yet.
    pub fn new(url: &str, verify: VerifyEvent) -> Result<Self> {
        Self::with_config(url, verify, RelayConfig::default())
    }

    /// Create a connection with custom timeouts. Does not connect yet.
    pub fn with_config(url: &str, verify: VerifyEvent, config: RelayConfig) -> Result<Self> {
        let url = normalize_relay_url(url)?;
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                url,
                verify,
                connected: AtomicBool::new(false),
                inner: Mutex::new(Inner::default()),
                observers: Mutex::new(Observers::default()),
            }),
            connect_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Normalized relay url.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Whether the transport is currently open.
    pub fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Latest auth challenge announced by the relay, if any.
    pub fn challenge(&self) -> Option<String> {
        self.shared.lock_inner().challenge.clone()
    }

    /// Replace the NOTICE observer. Without one, notices are logged at debug.
    pub fn on_notice(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.shared.lock_observers().on_notice = Some(Arc::new(f));
    }

    /// Replace the auth-challenge observer.
    pub fn on_auth_challenge(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.shared.lock_observers().on_auth = Some(Arc::new(f));
    }

    /// Replace the observer fired when the connection terminates for any
    /// reason other than an explicit local `close`.
    pub fn on_disconnect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.shared.lock_observers().on_disconnect = Some(Arc::new(f));
    }

    /// Open the transport. Idempotent: concurrent calls share one attempt and
    /// a call on an already-open connection returns immediately.
    ///
    /// On transport error or timeout, all open subscriptions and pending
    /// requests are terminated with a descriptive reason.
    pub async fn connect(&self) -> Result<()> {
        let _attempt = self.connect_lock.lock().await;
        if self.connected() {
            return Ok(());
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let queue = Arc::new(MessageQueue::new());
        {
            let mut inner = self.shared.lock_inner();
            inner.challenge = None;
            inner.outbound = Some(out_tx);
            inner.queue = Some(Arc::clone(&queue));
        }

        debug!(url = %self.shared.url, "connecting to relay");
        let ws = match timeout(
            self.config.connect_timeout,
            connect_async(self.shared.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                self.shared.shutdown("relay connection errored", true);
                return Err(RelayError::WebSocket(e.to_string()));
            }
            Err(_) => {
                self.shared.shutdown("relay connection timed out", true);
                return Err(RelayError::ConnectionTimeout);
            }
        };

        let (mut sink, mut stream) = ws.split();
        self.shared.connected.store(true, Ordering::Release);

        // Writes queued during the handshake drain here, after completion.
        // The writer is not tracked in io_tasks: teardown drops the outbound
        // sender instead, so frames queued by shutdown still go out before the
        // graceful Close.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        let reader = tokio::spawn({
            let shared = Arc::clone(&self.shared);
            let queue = Arc::clone(&queue);
            async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            queue.push(text.to_string());
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            debug!(url = %shared.url, error = %e, "websocket read error");
                            break;
                        }
                    }
                }
                if shared.connected.load(Ordering::Acquire) {
                    shared.shutdown("relay connection closed", true);
                }
            }
        });

        // Single drain loop: one message per turn, yielding in between.
        let dispatcher = tokio::spawn({
            let shared = Arc::clone(&self.shared);
            async move {
                while let Some(raw) = queue.pop().await {
                    shared.handle_raw_message(&raw);
                    tokio::task::yield_now().await;
                }
            }
        });

        self.shared.lock_inner().io_tasks = vec![reader, dispatcher];
        debug!(url = %self.shared.url, "relay connected");
        Ok(())
    }

    /// Queue a raw wire message behind connection completion.
    ///
    /// Fails with [`RelayError::NotConnected`] if no connection attempt has
    /// been started (or the connection has been torn down).
    pub fn send(&self, raw: impl Into<String>) -> Result<()> {
        let inner = self.shared.lock_inner();
        let tx = inner.outbound.as_ref().ok_or(RelayError::NotConnected)?;
        tx.send(raw.into()).map_err(|_| RelayError::NotConnected)
    }

    fn send_client(&self, msg: &ClientMessage) -> Result<()> {
        self.send(msg.to_json()?)
    }

    /// Register a subscription, transmit its REQ, and start the EOSE deadline
    /// timer. Results arrive asynchronously through the callbacks in `params`.
    pub fn subscribe(
        &self,
        filters: Vec<Filter>,
        mut params: SubscribeParams,
    ) -> Result<SubscriptionHandle> {
        let eose_timeout = params
            .eose_timeout
            .take()
            .unwrap_or(self.config.eose_timeout);
        let id = match params.id.take() {
            Some(id) => id,
            None => self.shared.next_id("sub"),
        };

        // A reused id replaces the live subscription: the old entry is torn
        // down first so its EOSE timer cannot fire against the new one.
        let replaced_close = {
            let mut inner = self.shared.lock_inner();
            let replaced = inner.subscriptions.remove(&id).and_then(|mut old| {
                old.cancel_timer();
                old.on_close.take()
            });
            inner.subscriptions.insert(
                id.clone(),
                Subscription::new(id.clone(), filters.clone(), params),
            );
            replaced
        };
        if let Some(f) = replaced_close {
            f("subscription id reused".to_string());
        }

        if let Err(e) = self.send_client(&ClientMessage::Req {
            subscription_id: id.clone(),
            filters,
        }) {
            self.shared.lock_inner().subscriptions.remove(&id);
            return Err(e);
        }

        let timer = tokio::spawn({
            let shared = Arc::clone(&self.shared);
            let id = id.clone();
            async move {
                tokio::time::sleep(eose_timeout).await;
                shared.receive_eose(&id);
            }
        });
        match self.shared.lock_inner().subscriptions.get_mut(&id) {
            Some(sub) => sub.eose_timer = Some(timer),
            // closed in the window between REQ and timer attach
            None => timer.abort(),
        }

        Ok(SubscriptionHandle {
            id,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Transmit an EVENT and wait for the correlated OK.
    ///
    /// Resolves with the relay's acceptance reason, or fails with
    /// [`RelayError::Rejected`] carrying the rejection reason, or with
    /// [`RelayError::PublishTimeout`] if no acknowledgement arrives in time.
    pub async fn publish(&self, event: &Event) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .lock_inner()
            .publish_waiters
            .insert(event.id.clone(), tx);

        if let Err(e) = self.send_client(&ClientMessage::Event(event.clone())) {
            self.shared.lock_inner().publish_waiters.remove(&event.id);
            return Err(e);
        }

        self.spawn_publish_deadline(event.id.clone());
        rx.await.unwrap_or(Err(RelayError::ConnectionClosed(
            "relay connection closed".to_string(),
        )))
    }

    /// Transmit a COUNT request and wait for the correlated reply.
    ///
    /// A generated `count:<serial>` correlation id is used unless the caller
    /// supplies one. Only waits against a deadline when
    /// [`RelayConfig::count_timeout`] is set.
    pub async fn count(&self, filters: Vec<Filter>, id: Option<String>) -> Result<u64> {
        let id = id.unwrap_or_else(|| self.shared.next_id("count"));
        let (tx, rx) = oneshot::channel();
        self.shared.lock_inner().count_waiters.insert(id.clone(), tx);

        if let Err(e) = self.send_client(&ClientMessage::Count {
            request_id: id.clone(),
            filters,
        }) {
            self.shared.lock_inner().count_waiters.remove(&id);
            return Err(e);
        }

        if let Some(wait) = self.config.count_timeout {
            tokio::spawn({
                let shared = Arc::clone(&self.shared);
                let id = id.clone();
                async move {
                    tokio::time::sleep(wait).await;
                    let waiter = shared.lock_inner().count_waiters.remove(&id);
                    if let Some(tx) = waiter {
                        let _ = tx.send(Err(RelayError::CountTimeout));
                    }
                }
            });
        }

        rx.await.unwrap_or(Err(RelayError::ConnectionClosed(
            "relay connection closed".to_string(),
        )))
    }

    /// Sign and send a NIP-42 authentication event for the challenge the relay
    /// announced, then wait for the OK acknowledgement.
    ///
    /// Fails with [`RelayError::NoChallenge`] if no challenge was received.
    pub async fn auth<F, Fut>(&self, sign: F) -> Result<String>
    where
        F: FnOnce(EventTemplate) -> Fut,
        Fut: Future<Output = Result<Event>>,
    {
        let challenge = self
            .shared
            .lock_inner()
            .challenge
            .clone()
            .ok_or(RelayError::NoChallenge)?;

        let template = make_auth_event(&self.shared.url, &challenge);
        let event = sign(template).await?;

        let (tx, rx) = oneshot::channel();
        self.shared
            .lock_inner()
            .publish_waiters
            .insert(event.id.clone(), tx);

        if let Err(e) = self.send_client(&ClientMessage::Auth(event.clone())) {
            self.shared.lock_inner().publish_waiters.remove(&event.id);
            return Err(e);
        }

        self.spawn_publish_deadline(event.id.clone());
        rx.await.unwrap_or(Err(RelayError::ConnectionClosed(
            "relay connection closed".to_string(),
        )))
    }

    fn spawn_publish_deadline(&self, event_id: String) {
        tokio::spawn({
            let shared = Arc::clone(&self.shared);
            let wait = self.config.publish_timeout;
            async move {
                tokio::time::sleep(wait).await;
                let waiter = shared.lock_inner().publish_waiters.remove(&event_id);
                if let Some(tx) = waiter {
                    let _ = tx.send(Err(RelayError::PublishTimeout));
                }
            }
        });
    }

    /// Tear the connection down: sends a close notice per open subscription,
    /// terminates every pending request, and closes the transport.
    pub fn close(&self) {
        self.shared.shutdown("relay connection closed by us", false);
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("connection state poisoned")
    }

    fn lock_observers(&self) -> MutexGuard<'_, Observers> {
        self.observers.lock().expect("observer state poisoned")
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut inner = self.lock_inner();
        inner.serial += 1;
        format!("{prefix}:{}", inner.serial)
    }

    /// Dispatch one inbound frame. Runs only on the single drain task.
    fn handle_raw_message(&self, raw: &str) {
        // Cheap pre-parse path for EVENT frames: resolve the subscription and
        // consult the already-seen predicate before paying for a full parse.
        if let Some(sub_id) = scan_subscription_id(raw) {
            let callbacks = {
                let inner = self.lock_inner();
                match inner.subscriptions.get(sub_id) {
                    None => return,
                    Some(sub) => (sub.already_have.clone(), sub.received_event.clone()),
                }
            };
            if let Some(event_id) = scan_hex64(raw, "id") {
                let (already_have, received_event) = callbacks;
                let seen = already_have.map(|f| f(event_id)).unwrap_or(false);
                if let Some(f) = received_event {
                    f(&self.url, event_id);
                }
                if seen {
                    trace!(url = %self.url, event = %event_id, "suppressing duplicate event");
                    return;
                }
            }
        }

        let msg = match RelayMessage::from_json(raw) {
            Ok(msg) => msg,
            Err(e) => {
                trace!(url = %self.url, error = %e, "discarding unparseable message");
                return;
            }
        };

        match msg {
            RelayMessage::Event {
                subscription_id,
                event,
            } => {
                let (filters, on_event) = {
                    let inner = self.lock_inner();
                    let Some(sub) = inner.subscriptions.get(&subscription_id) else {
                        return;
                    };
                    (sub.filters.clone(), sub.on_event.clone())
                };
                if (self.verify)(&event) && matches_any(&filters, &event) {
                    match on_event {
                        Some(f) => f(event),
                        None => warn!(
                            url = %self.url,
                            subscription = %subscription_id,
                            "event received with no on_event handler"
                        ),
                    }
                }
            }
            RelayMessage::Count { request_id, count } => {
                let waiter = self.lock_inner().count_waiters.remove(&request_id);
                if let Some(tx) = waiter {
                    let _ = tx.send(Ok(count));
                }
            }
            RelayMessage::Eose { subscription_id } => self.receive_eose(&subscription_id),
            RelayMessage::Ok {
                event_id,
                accepted,
                reason,
            } => {
                let waiter = self.lock_inner().publish_waiters.remove(&event_id);
                if let Some(tx) = waiter {
                    let outcome = if accepted {
                        Ok(reason)
                    } else {
                        Err(RelayError::Rejected(reason))
                    };
                    let _ = tx.send(outcome);
                }
            }
            RelayMessage::Closed {
                subscription_id,
                reason,
            } => {
                let on_close = {
                    let mut inner = self.lock_inner();
                    inner.subscriptions.remove(&subscription_id).and_then(|mut sub| {
                        sub.cancel_timer();
                        sub.on_close.take()
                    })
                };
                if let Some(f) = on_close {
                    f(reason);
                }
            }
            RelayMessage::Notice { text } => {
                let observer = self.lock_observers().on_notice.clone();
                match observer {
                    Some(f) => f(&text),
                    None => debug!(url = %self.url, notice = %text, "NOTICE from relay"),
                }
            }
            RelayMessage::Auth { challenge } => {
                self.lock_inner().challenge = Some(challenge.clone());
                let observer = self.lock_observers().on_auth.clone();
                if let Some(f) = observer {
                    f(&challenge);
                }
            }
        }
    }

    /// Mark a subscription end-of-stored-events. Idempotent: the callback
    /// fires at most once, whether triggered by signal or local timeout.
    fn receive_eose(&self, sub_id: &str) {
        let on_eose = {
            let mut inner = self.lock_inner();
            let Some(sub) = inner.subscriptions.get_mut(sub_id) else {
                return;
            };
            if sub.eosed {
                return;
            }
            sub.eosed = true;
            sub.cancel_timer();
            sub.on_eose.take()
        };
        if let Some(f) = on_eose {
            f();
        }
    }

    fn close_subscription(&self, id: &str, reason: &str) {
        let (sub, outbound) = {
            let mut inner = self.lock_inner();
            (inner.subscriptions.remove(id), inner.outbound.clone())
        };
        let Some(mut sub) = sub else {
            return;
        };
        if self.connected.load(Ordering::Acquire) {
            if let Some(tx) = outbound {
                let msg = ClientMessage::Close {
                    subscription_id: id.to_string(),
                };
                if let Ok(text) = msg.to_json() {
                    let _ = tx.send(text);
                }
            }
        }
        sub.cancel_timer();
        if let Some(f) = sub.on_close.take() {
            f(reason.to_string());
        }
    }

    /// Terminate everything owned by this connection with the given reason.
    /// Synchronous; safe to call from any path including the reader task.
    fn shutdown(&self, reason: &str, notify: bool) {
        self.connected.store(false, Ordering::Release);

        let (subs, publishes, counts, queue, tasks) = {
            let mut inner = self.lock_inner();
            if let Some(tx) = &inner.outbound {
                for id in inner.subscriptions.keys() {
                    let msg = ClientMessage::Close {
                        subscription_id: id.clone(),
                    };
                    if let Ok(text) = msg.to_json() {
                        let _ = tx.send(text);
                    }
                }
            }
            inner.outbound = None;
            inner.challenge = None;
            (
                std::mem::take(&mut inner.subscriptions),
                std::mem::take(&mut inner.publish_waiters),
                std::mem::take(&mut inner.count_waiters),
                inner.queue.take(),
                std::mem::take(&mut inner.io_tasks),
            )
        };

        if let Some(queue) = queue {
            queue.close();
        }
        // Aborts only the reader and dispatcher. The writer keeps running
        // until the just-dropped outbound sender empties, so the CLOSE notices
        // queued above still reach the relay before the transport closes.
        for task in &tasks {
            task.abort();
        }

        for (_, mut sub) in subs {
            sub.cancel_timer();
            if let Some(f) = sub.on_close.take() {
                f(reason.to_string());
            }
        }
        for (_, waiter) in publishes {
            let _ = waiter.send(Err(RelayError::ConnectionClosed(reason.to_string())));
        }
        for (_, waiter) in counts {
            let _ = waiter.send(Err(RelayError::ConnectionClosed(reason.to_string())));
        }

        if notify {
            let observer = self.lock_observers().on_disconnect.clone();
            if let Some(f) = observer {
                f();
            }
        }
        debug!(url = %self.url, reason = %reason, "relay connection torn down");
    }
}

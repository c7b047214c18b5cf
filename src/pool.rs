//! Multi-relay fan-out.
//!
//! A [`RelayPool`] keeps at most one [`RelayConnection`] per normalized relay
//! address and fans subscriptions, queries, and publishes out across relay
//! sets. Events flowing back are deduplicated by id across connections, and
//! per-relay end-of-stored-events and close signals are aggregated into single
//! pool-level callbacks.

use crate::error::{RelayError, Result};
use crate::event::{always_verified, Event, VerifyEvent};
use crate::filter::Filter;
use crate::relay::{RelayConfig, RelayConnection, SubscriptionHandle};
use crate::subscription::{
    AlreadyHaveCallback, EventCallback, OnceCallback, ReceivedEventCallback, SubscribeParams,
};
use crate::url::normalize_relay_url;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

/// Aggregate close callback, invoked with one reason per requested relay.
pub type PoolCloseCallback = Box<dyn FnOnce(Vec<String>) + Send>;

/// Parameters for the pool's fan-out subscription operations.
#[derive(Default)]
pub struct PoolSubscribeParams {
    /// Subscription id reused on every relay; generated per relay when absent.
    pub id: Option<String>,
    /// Invoked for each event, deduplicated across relays by event id.
    pub on_event: Option<EventCallback>,
    /// Invoked exactly once, after every relay has reached end-of-stored-events
    /// (or was counted as such by failing or closing).
    pub on_eose: Option<OnceCallback>,
    /// Invoked exactly once, after every relay's subscription has closed.
    pub on_close: Option<PoolCloseCallback>,
    /// Replaces the pool's internal cross-relay deduplication set.
    pub already_have: Option<AlreadyHaveCallback>,
    /// Observer for every delivery attempt, before deduplication.
    pub received_event: Option<ReceivedEventCallback>,
    /// Overall connection budget per relay; the connect deadline is derived
    /// from it so the subscription request still fits inside the budget.
    pub max_wait: Option<Duration>,
    /// Per-relay deadline for forcing end-of-stored-events locally.
    pub eose_timeout: Option<Duration>,
}

/// Aggregates per-relay EOSE and close signals for one fan-out request.
struct FanoutTracker {
    state: Mutex<FanoutState>,
}

struct FanoutState {
    eosed: Vec<bool>,
    closed: Vec<Option<String>>,
    on_eose: Option<OnceCallback>,
    on_close: Option<PoolCloseCallback>,
}

impl FanoutTracker {
    fn new(
        total: usize,
        on_eose: Option<OnceCallback>,
        on_close: Option<PoolCloseCallback>,
    ) -> Arc<Self> {
        let tracker = Arc::new(Self {
            state: Mutex::new(FanoutState {
                eosed: vec![false; total],
                closed: vec![None; total],
                on_eose,
                on_close,
            }),
        });
        if total == 0 {
            // nothing to wait for
            tracker.fire_if_complete();
        }
        tracker
    }

    fn note_eose(&self, index: usize) {
        {
            let mut state = self.lock();
            state.eosed[index] = true;
        }
        self.fire_if_complete();
    }

    /// A closed relay slot can no longer produce stored events, so close
    /// implies EOSE for that slot. Later signals for the slot are ignored.
    fn note_close(&self, index: usize, reason: String) {
        {
            let mut state = self.lock();
            if state.closed[index].is_some() {
                return;
            }
            state.closed[index] = Some(reason);
            state.eosed[index] = true;
        }
        self.fire_if_complete();
    }

    fn fire_if_complete(&self) {
        let (on_eose, on_close) = {
            let mut state = self.lock();
            let all_eosed = state.eosed.iter().all(|e| *e);
            let all_closed = state.closed.iter().all(Option::is_some);
            (
                if all_eosed { state.on_eose.take() } else { None },
                if all_closed {
                    state.on_close.take().map(|f| {
                        let reasons = state
                            .closed
                            .iter()
                            .map(|r| r.clone().unwrap_or_default())
                            .collect::<Vec<_>>();
                        (f, reasons)
                    })
                } else {
                    None
                },
            )
        };
        if let Some(f) = on_eose {
            f();
        }
        if let Some((f, reasons)) = on_close {
            f(reasons);
        }
    }

    fn lock(&self) -> MutexGuard<'_, FanoutState> {
        self.state.lock().expect("fanout state poisoned")
    }
}

struct PoolSubInner {
    /// In-flight per-relay open tasks.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Handles of successfully opened per-relay subscriptions.
    subs: Mutex<Vec<SubscriptionHandle>>,
}

/// Handle to one fan-out subscription across a relay set.
#[derive(Clone)]
pub struct PoolSubscription {
    inner: Arc<PoolSubInner>,
}

impl PoolSubscription {
    fn new() -> Self {
        Self {
            inner: Arc::new(PoolSubInner {
                tasks: Mutex::new(Vec::new()),
                subs: Mutex::new(Vec::new()),
            }),
        }
    }

    fn push_sub(&self, handle: SubscriptionHandle) {
        self.inner
            .subs
            .lock()
            .expect("pool subscription poisoned")
            .push(handle);
    }

    fn set_tasks(&self, tasks: Vec<JoinHandle<()>>) {
        *self.inner.tasks.lock().expect("pool subscription poisoned") = tasks;
    }

    /// Cancel the subscription on every relay. Waits for per-relay opens that
    /// are still in flight so none of them survives the close.
    pub async fn close(&self) {
        let tasks = std::mem::take(
            &mut *self.inner.tasks.lock().expect("pool subscription poisoned"),
        );
        for task in tasks {
            let _ = task.await;
        }
        let subs = std::mem::take(
            &mut *self.inner.subs.lock().expect("pool subscription poisoned"),
        );
        for sub in subs {
            sub.close();
        }
    }
}

/// A set of relay connections, keyed by normalized address.
pub struct RelayPool {
    verify: VerifyEvent,
    config: RelayConfig,
    relays: Mutex<HashMap<String, Arc<RelayConnection>>>,
    /// Relay urls an event id has been seen on, maintained when tracking is on.
    seen_on: Mutex<HashMap<String, HashSet<String>>>,
    track_relays: AtomicBool,
    /// Relays whose events skip signature verification.
    trusted_relays: Mutex<HashSet<String>>,
}

impl RelayPool {
    /// Create a pool with default timeouts.
    pub fn new(verify: VerifyEvent) -> Arc<Self> {
        Self::with_config(verify, RelayConfig::default())
    }

    /// Create a pool whose connections use the given timeouts.
    pub fn with_config(verify: VerifyEvent, config: RelayConfig) -> Arc<Self> {
        Arc::new(Self {
            verify,
            config,
            relays: Mutex::new(HashMap::new()),
            seen_on: Mutex::new(HashMap::new()),
            track_relays: AtomicBool::new(false),
            trusted_relays: Mutex::new(HashSet::new()),
        })
    }

    /// Enable or disable per-event relay tracking (see [`RelayPool::seen_on`]).
    pub fn set_track_relays(&self, track: bool) {
        self.track_relays.store(track, Ordering::Release);
    }

    /// Mark a relay as trusted: events from it skip signature verification.
    /// Takes effect for connections created after the call.
    pub fn trust_relay(&self, url: &str) -> Result<()> {
        let url = normalize_relay_url(url)?;
        self.lock_trusted().insert(url);
        Ok(())
    }

    /// Relay urls the given event id has been seen on. Empty unless tracking
    /// was enabled with [`RelayPool::set_track_relays`].
    pub fn seen_on(&self, event_id: &str) -> Vec<String> {
        let seen = self.lock_seen();
        let mut urls: Vec<String> = seen
            .get(event_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        urls.sort();
        urls
    }

    /// The pooled connection for a relay, if one exists.
    pub fn relay(&self, url: &str) -> Option<Arc<RelayConnection>> {
        let url = normalize_relay_url(url).ok()?;
        self.lock_relays().get(&url).cloned()
    }

    /// Connection state per pooled relay.
    pub fn list_connection_status(&self) -> HashMap<String, bool> {
        self.lock_relays()
            .iter()
            .map(|(url, relay)| (url.clone(), relay.connected()))
            .collect()
    }

    /// Get or create the connection for a relay and make sure it is open.
    ///
    /// The pool holds at most one connection per normalized address, so
    /// concurrent callers share the connection and its single connect attempt.
    /// `max_wait` bounds the whole call; the transport deadline is derived
    /// from it, leaving headroom to register work after the open.
    pub async fn ensure_relay(
        &self,
        url: &str,
        max_wait: Option<Duration>,
    ) -> Result<Arc<RelayConnection>> {
        let url = normalize_relay_url(url)?;
        let relay = {
            let mut relays = self.lock_relays();
            match relays.get(&url) {
                Some(relay) => Arc::clone(relay),
                None => {
                    let verify = if self.lock_trusted().contains(&url) {
                        always_verified()
                    } else {
                        Arc::clone(&self.verify)
                    };
                    let relay = Arc::new(RelayConnection::with_config(
                        &url,
                        verify,
                        self.config.clone(),
                    )?);
                    relays.insert(url.clone(), Arc::clone(&relay));
                    relay
                }
            }
        };

        match max_wait {
            Some(wait) => match timeout(connect_deadline(wait), relay.connect()).await {
                Ok(result) => result?,
                Err(_) => return Err(RelayError::ConnectionTimeout),
            },
            None => relay.connect().await?,
        }
        Ok(relay)
    }

    /// Subscribe with the same filter set on every relay in `urls`.
    pub fn subscribe_many(
        self: &Arc<Self>,
        urls: Vec<String>,
        filters: Vec<Filter>,
        params: PoolSubscribeParams,
    ) -> PoolSubscription {
        let requests = urls
            .into_iter()
            .map(|url| (url, filters.clone()))
            .collect();
        self.subscribe_many_map(requests, params)
    }

    /// Subscribe with per-relay filter sets.
    ///
    /// Every requested relay occupies one aggregation slot: a relay that fails
    /// to connect, rejects the subscription, or appears twice is counted as
    /// closed (and therefore end-of-stored-events) for its slot, so the
    /// aggregate callbacks always fire eventually.
    pub fn subscribe_many_map(
        self: &Arc<Self>,
        requests: Vec<(String, Vec<Filter>)>,
        mut params: PoolSubscribeParams,
    ) -> PoolSubscription {
        let tracker = FanoutTracker::new(requests.len(), params.on_eose.take(), params.on_close.take());
        let subscription = PoolSubscription::new();

        // Cross-relay deduplication: the caller's predicate, or a shared
        // check-and-insert set.
        let already_have: AlreadyHaveCallback = match params.already_have.take() {
            Some(f) => f,
            None => {
                let known = Mutex::new(HashSet::<String>::new());
                Arc::new(move |id| !known.lock().expect("dedup set poisoned").insert(id.to_string()))
            }
        };

        let received_event = self.make_received_event(params.received_event.take());

        let mut seen_urls = HashSet::new();
        let mut tasks = Vec::with_capacity(requests.len());
        for (index, (url, filters)) in requests.into_iter().enumerate() {
            let normalized = match normalize_relay_url(&url) {
                Ok(normalized) => normalized,
                Err(e) => {
                    tracker.note_close(index, e.to_string());
                    continue;
                }
            };
            if !seen_urls.insert(normalized.clone()) {
                tracker.note_close(index, "duplicate url".to_string());
                continue;
            }

            let task = tokio::spawn({
                let pool = Arc::clone(self);
                let tracker = Arc::clone(&tracker);
                let subscription = subscription.clone();
                let sub_params = SubscribeParams {
                    id: params.id.clone(),
                    on_event: params.on_event.clone(),
                    on_eose: Some(Box::new({
                        let tracker = Arc::clone(&tracker);
                        move || tracker.note_eose(index)
                    })),
                    on_close: Some(Box::new({
                        let tracker = Arc::clone(&tracker);
                        move |reason| tracker.note_close(index, reason)
                    })),
                    already_have: Some(Arc::clone(&already_have)),
                    received_event: Some(Arc::clone(&received_event)),
                    eose_timeout: params.eose_timeout,
                };
                let max_wait = params.max_wait;
                async move {
                    let relay = match pool.ensure_relay(&normalized, max_wait).await {
                        Ok(relay) => relay,
                        Err(e) => {
                            debug!(url = %normalized, error = %e, "skipping unreachable relay");
                            tracker.note_close(index, e.to_string());
                            return;
                        }
                    };
                    match relay.subscribe(filters, sub_params) {
                        Ok(handle) => subscription.push_sub(handle),
                        Err(e) => tracker.note_close(index, e.to_string()),
                    }
                }
            });
            tasks.push(task);
        }

        subscription.set_tasks(tasks);
        subscription
    }

    /// Like [`RelayPool::subscribe_many`], but the subscription closes itself
    /// once every relay has reached end-of-stored-events.
    pub fn subscribe_many_eose(
        self: &Arc<Self>,
        urls: Vec<String>,
        filters: Vec<Filter>,
        mut params: PoolSubscribeParams,
    ) -> PoolSubscription {
        let (eose_tx, eose_rx) = oneshot::channel();
        let caller_on_eose = params.on_eose.take();
        params.on_eose = Some(Box::new(move || {
            let _ = eose_tx.send(());
            if let Some(f) = caller_on_eose {
                f();
            }
        }));

        let subscription = self.subscribe_many(urls, filters, params);
        tokio::spawn({
            let subscription = subscription.clone();
            async move {
                if eose_rx.await.is_ok() {
                    subscription.close().await;
                }
            }
        });
        subscription
    }

    /// Fetch stored events matching `filter` from every relay, returning once
    /// all relays have reached end-of-stored-events. Results are deduplicated
    /// but not sorted.
    pub async fn query_sync(self: &Arc<Self>, urls: Vec<String>, filter: Filter) -> Vec<Event> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();

        let _subscription = self.subscribe_many_eose(
            urls,
            vec![filter],
            PoolSubscribeParams {
                on_event: Some(Arc::new({
                    let events = Arc::clone(&events);
                    move |event| {
                        events.lock().expect("query buffer poisoned").push(event);
                    }
                })),
                on_close: Some(Box::new(move |_| {
                    let _ = done_tx.send(());
                })),
                ..Default::default()
            },
        );

        let _ = done_rx.await;
        let collected = std::mem::take(&mut *events.lock().expect("query buffer poisoned"));
        collected
    }

    /// Fetch the single newest stored event matching `filter` across `urls`.
    pub async fn get(self: &Arc<Self>, urls: Vec<String>, filter: Filter) -> Option<Event> {
        let mut events = self.query_sync(urls, filter.limit(1)).await;
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.into_iter().next()
    }

    /// Publish an event to every relay in `urls`, one independent attempt per
    /// relay. Each returned task resolves to that relay's acceptance reason or
    /// failure; a repeated url fails with [`RelayError::DuplicateUrl`].
    pub fn publish(
        self: &Arc<Self>,
        urls: Vec<String>,
        event: Event,
    ) -> Vec<JoinHandle<Result<String>>> {
        let mut seen_urls = HashSet::new();
        urls.into_iter()
            .map(|url| {
                let normalized = match normalize_relay_url(&url) {
                    Ok(normalized) => normalized,
                    Err(e) => return tokio::spawn(async move { Err(e) }),
                };
                if !seen_urls.insert(normalized.clone()) {
                    return tokio::spawn(async { Err(RelayError::DuplicateUrl) });
                }
                tokio::spawn({
                    let pool = Arc::clone(self);
                    let event = event.clone();
                    async move {
                        let relay = pool.ensure_relay(&normalized, None).await?;
                        let reason = relay.publish(&event).await?;
                        pool.record_seen(&event.id, relay.url());
                        Ok(reason)
                    }
                })
            })
            .collect()
    }

    /// Close and forget the connections for the given relays.
    pub fn close(&self, urls: Vec<String>) {
        let mut removed = Vec::new();
        {
            let mut relays = self.lock_relays();
            for url in urls {
                if let Ok(normalized) = normalize_relay_url(&url) {
                    if let Some(relay) = relays.remove(&normalized) {
                        removed.push(relay);
                    }
                }
            }
        }
        for relay in removed {
            relay.close();
        }
    }

    /// Close every connection and empty the pool.
    pub fn destroy(&self) {
        let relays: Vec<_> = self.lock_relays().drain().map(|(_, r)| r).collect();
        for relay in relays {
            relay.close();
        }
    }

    /// Build the per-delivery observer chained in front of the caller's: it
    /// keeps the seen-on index current when tracking is enabled.
    fn make_received_event(
        self: &Arc<Self>,
        caller: Option<ReceivedEventCallback>,
    ) -> ReceivedEventCallback {
        let pool = Arc::downgrade(self);
        Arc::new(move |relay_url, event_id| {
            if let Some(pool) = Weak::upgrade(&pool) {
                pool.record_seen(event_id, relay_url);
            }
            if let Some(f) = &caller {
                f(relay_url, event_id);
            }
        })
    }

    fn record_seen(&self, event_id: &str, relay_url: &str) {
        if !self.track_relays.load(Ordering::Acquire) {
            return;
        }
        self.lock_seen()
            .entry(event_id.to_string())
            .or_default()
            .insert(relay_url.to_string());
    }

    fn lock_relays(&self) -> MutexGuard<'_, HashMap<String, Arc<RelayConnection>>> {
        self.relays.lock().expect("relay map poisoned")
    }

    fn lock_seen(&self) -> MutexGuard<'_, HashMap<String, HashSet<String>>> {
        self.seen_on.lock().expect("seen-on map poisoned")
    }

    fn lock_trusted(&self) -> MutexGuard<'_, HashSet<String>> {
        self.trusted_relays.lock().expect("trusted set poisoned")
    }
}

/// Transport deadline derived from an overall per-relay budget: most of the
/// budget, but leaving up to a second of headroom for work after the open.
fn connect_deadline(max_wait: Duration) -> Duration {
    max_wait
        .mul_f64(0.8)
        .max(max_wait.saturating_sub(Duration::from_secs(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn pool() -> Arc<RelayPool> {
        RelayPool::new(always_verified())
    }

    #[test]
    fn connect_deadline_derivation() {
        assert_eq!(
            connect_deadline(Duration::from_secs(10)),
            Duration::from_secs(9)
        );
        // below five seconds the 80% share wins
        assert_eq!(
            connect_deadline(Duration::from_secs(2)),
            Duration::from_millis(1600)
        );
        assert_eq!(connect_deadline(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn tracker_fires_eose_after_every_slot() {
        let fired = Arc::new(AtomicUsize::new(0));
        let tracker = FanoutTracker::new(
            3,
            Some(Box::new({
                let fired = Arc::clone(&fired);
                move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            })),
            None,
        );

        tracker.note_eose(0);
        tracker.note_eose(2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tracker.note_eose(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // duplicate signals change nothing
        tracker.note_eose(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tracker_close_implies_eose() {
        let eose = Arc::new(AtomicUsize::new(0));
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let tracker = FanoutTracker::new(
            2,
            Some(Box::new({
                let eose = Arc::clone(&eose);
                move || {
                    eose.fetch_add(1, Ordering::SeqCst);
                }
            })),
            Some(Box::new({
                let reasons = Arc::clone(&reasons);
                move |r| {
                    *reasons.lock().unwrap() = r;
                }
            })),
        );

        tracker.note_eose(0);
        tracker.note_close(1, "relay connection errored".to_string());
        assert_eq!(eose.load(Ordering::SeqCst), 1);
        assert!(reasons.lock().unwrap().is_empty());

        tracker.note_close(0, "closed by caller".to_string());
        let reasons = reasons.lock().unwrap();
        assert_eq!(reasons.len(), 2);
        assert_eq!(reasons[0], "closed by caller");
        assert_eq!(reasons[1], "relay connection errored");
    }

    #[test]
    fn tracker_first_close_reason_wins() {
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let tracker = FanoutTracker::new(
            1,
            None,
            Some(Box::new({
                let reasons = Arc::clone(&reasons);
                move |r| {
                    *reasons.lock().unwrap() = r;
                }
            })),
        );

        tracker.note_close(0, "first".to_string());
        tracker.note_close(0, "second".to_string());
        assert_eq!(*reasons.lock().unwrap(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn empty_relay_set_completes_immediately() {
        let (eose_tx, eose_rx) = oneshot::channel();
        let (close_tx, close_rx) = oneshot::channel();

        pool().subscribe_many(
            vec![],
            vec![Filter::new()],
            PoolSubscribeParams {
                on_eose: Some(Box::new(move || {
                    let _ = eose_tx.send(());
                })),
                on_close: Some(Box::new(move |reasons| {
                    let _ = close_tx.send(reasons);
                })),
                ..Default::default()
            },
        );

        eose_rx.await.unwrap();
        assert!(close_rx.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_url_occupies_a_closed_slot() {
        let (close_tx, close_rx) = oneshot::channel();

        let sub = pool().subscribe_many(
            vec![
                "wss://127.0.0.1:1".to_string(),
                "wss://127.0.0.1:1/".to_string(),
            ],
            vec![Filter::new()],
            PoolSubscribeParams {
                max_wait: Some(Duration::from_millis(500)),
                on_close: Some(Box::new(move |reasons| {
                    let _ = close_tx.send(reasons);
                })),
                ..Default::default()
            },
        );

        let reasons = close_rx.await.unwrap();
        assert_eq!(reasons.len(), 2);
        assert_eq!(reasons[1], "duplicate url");
        sub.close().await;
    }

    #[tokio::test]
    async fn duplicate_publish_url_fails_fast() {
        let event = Event {
            id: "e1".to_string(),
            pubkey: "pk".to_string(),
            created_at: 1,
            kind: 1,
            tags: vec![],
            content: String::new(),
            sig: "sig".to_string(),
        };
        let pool = RelayPool::with_config(
            always_verified(),
            RelayConfig {
                connect_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        );

        let results = pool.publish(
            vec![
                "wss://127.0.0.1:1".to_string(),
                "wss://127.0.0.1:1".to_string(),
            ],
            event,
        );
        assert_eq!(results.len(), 2);
        let mut outcomes = Vec::new();
        for task in results {
            outcomes.push(task.await.unwrap());
        }
        assert!(outcomes[0].is_err());
        assert!(matches!(outcomes[1], Err(RelayError::DuplicateUrl)));
    }

    #[tokio::test]
    async fn ensure_relay_memoizes_per_normalized_url() {
        let pool = RelayPool::with_config(
            always_verified(),
            RelayConfig {
                connect_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        );

        // both attempts fail fast but the connection object is shared
        let _ = pool.ensure_relay("ws://127.0.0.1:1", None).await;
        let _ = pool.ensure_relay("ws://127.0.0.1:1/", None).await;

        assert_eq!(pool.lock_relays().len(), 1);
        let relay = pool.relay("ws://127.0.0.1:1").unwrap();
        assert_eq!(relay.url(), "ws://127.0.0.1:1");

        let status = pool.list_connection_status();
        assert_eq!(status.get("ws://127.0.0.1:1"), Some(&false));
    }

    #[test]
    fn seen_on_requires_tracking() {
        let pool = pool();
        pool.record_seen("e1", "wss://a.example.com");
        assert!(pool.seen_on("e1").is_empty());

        pool.set_track_relays(true);
        pool.record_seen("e1", "wss://b.example.com");
        pool.record_seen("e1", "wss://a.example.com");
        pool.record_seen("e1", "wss://a.example.com");
        assert_eq!(
            pool.seen_on("e1"),
            vec![
                "wss://a.example.com".to_string(),
                "wss://b.example.com".to_string()
            ]
        );
        assert!(pool.seen_on("other").is_empty());
    }

    #[test]
    fn invalid_urls_are_rejected_up_front() {
        let pool = pool();
        assert!(pool.trust_relay("wss://").is_err());
        assert!(pool.relay("wss://").is_none());
    }
}

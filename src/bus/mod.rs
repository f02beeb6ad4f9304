//! Event Bus & Subscription Fan-out
//!
//! Typed in-process pub/sub over the topics in [`EventKind`]. Every event
//! gets a monotonic `seq` from a lock-free counter; each subscription owns a
//! bounded queue guarded by its own mutex, so one slow consumer never stalls
//! the others.
//!
//! ## Backpressure
//!
//! The policy applied to an enqueue is resolved per event: a subscription
//! override wins, otherwise the topic's configured policy, otherwise the
//! default (`DropOldest` for the high-frequency optimization topics,
//! `BlockProducer` for everything else).
//!
//! - `DropOldest`: evict the oldest queued event and enqueue the new one
//! - `BlockProducer`: the publisher waits for space, up to a grace period
//! - `DropSubscription`: a queue that stays full past the grace period gets
//!   its subscription disconnected
//!
//! Emergency alerts (`emergency.alert`) jump to the head of every matching
//! queue and are never dropped. Ordering and seq-based de-duplication apply
//! to non-emergency traffic; emergencies are de-duplicated separately.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::config::{BackpressurePolicyName, BusConfig};
use crate::types::{Event, EventKind};

// ============================================================================
// Policy
// ============================================================================

/// Backpressure policy for a full subscription queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    DropOldest,
    BlockProducer,
    DropSubscription,
}

impl From<BackpressurePolicyName> for BackpressurePolicy {
    fn from(name: BackpressurePolicyName) -> Self {
        match name {
            BackpressurePolicyName::DropOldest => BackpressurePolicy::DropOldest,
            BackpressurePolicyName::BlockProducer => BackpressurePolicy::BlockProducer,
            BackpressurePolicyName::DropSubscription => BackpressurePolicy::DropSubscription,
        }
    }
}

impl std::fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackpressurePolicy::DropOldest => write!(f, "drop_oldest"),
            BackpressurePolicy::BlockProducer => write!(f, "block_producer"),
            BackpressurePolicy::DropSubscription => write!(f, "drop_subscription"),
        }
    }
}

/// Interval between retries while a `BlockProducer` publisher waits.
const BLOCK_RETRY: Duration = Duration::from_millis(5);

// ============================================================================
// Subscription internals
// ============================================================================

struct SubscriptionInner {
    id: u64,
    topics: HashSet<EventKind>,
    /// Per-subscription policy override; falls back to the topic policy
    policy_override: Option<BackpressurePolicy>,
    capacity: usize,
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    delivered: AtomicU64,
    dropped: AtomicU64,
    /// Highest non-emergency seq handed to the consumer (dedup)
    last_delivered: AtomicU64,
    /// Highest emergency seq handed to the consumer (dedup)
    last_emergency: AtomicU64,
    disconnected: AtomicBool,
    /// When the queue first became full (drop_subscription escalation)
    full_since: Mutex<Option<Instant>>,
}

impl SubscriptionInner {
    fn wants(&self, kind: EventKind) -> bool {
        !self.disconnected.load(Ordering::Acquire) && self.topics.contains(&kind)
    }
}

/// Observable subscription statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubscriptionStats {
    pub id: u64,
    pub topics: Vec<String>,
    /// Effective policy description ("per-topic" when no override is set)
    pub policy: String,
    pub queue_depth: usize,
    pub capacity: usize,
    pub delivered: u64,
    pub dropped: u64,
    pub disconnected: bool,
}

/// Consumer handle for one subscription.
///
/// Dropping the handle disconnects the subscription; the bus stops routing
/// to it on the next publish.
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Await the next event. Returns `None` once the subscription has been
    /// disconnected and its queue drained.
    pub async fn next(&self) -> Option<Event> {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(event) = self.try_next() {
                return Some(event);
            }
            if self.inner.disconnected.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Non-blocking pop with seq de-duplication.
    pub fn try_next(&self) -> Option<Event> {
        let mut queue = match self.inner.queue.lock() {
            Ok(q) => q,
            Err(_) => return None,
        };
        while let Some(event) = queue.pop_front() {
            let counter = if event.is_emergency() {
                &self.inner.last_emergency
            } else {
                &self.inner.last_delivered
            };
            let prev = counter.load(Ordering::Acquire);
            if event.seq <= prev && prev != 0 {
                // Duplicate delivery (at-least-once); skip silently
                continue;
            }
            counter.store(event.seq, Ordering::Release);
            self.inner.delivered.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut full_since) = self.inner.full_since.lock() {
                *full_since = None;
            }
            return Some(event);
        }
        None
    }

    pub fn stats(&self) -> SubscriptionStats {
        let queue_depth = self.inner.queue.lock().map(|q| q.len()).unwrap_or(0);
        SubscriptionStats {
            id: self.inner.id,
            topics: self.inner.topics.iter().map(|t| t.to_string()).collect(),
            policy: self
                .inner
                .policy_override
                .map_or_else(|| "per-topic".to_string(), |p| p.to_string()),
            queue_depth,
            capacity: self.inner.capacity,
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            disconnected: self.inner.disconnected.load(Ordering::Acquire),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.disconnected.store(true, Ordering::Release);
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// In-process typed event bus.
pub struct EventBus {
    seq: AtomicU64,
    next_sub_id: AtomicU64,
    subscriptions: RwLock<Vec<Arc<SubscriptionInner>>>,
    topic_policies: HashMap<EventKind, BackpressurePolicy>,
    default_capacity: usize,
    grace: Duration,
}

impl EventBus {
    /// Build a bus from configuration, applying per-topic policy overrides.
    pub fn new(config: &BusConfig) -> Self {
        let mut topic_policies: HashMap<EventKind, BackpressurePolicy> = EventKind::ALL
            .iter()
            .map(|&kind| {
                let policy = if kind.is_high_frequency() {
                    BackpressurePolicy::DropOldest
                } else {
                    BackpressurePolicy::BlockProducer
                };
                (kind, policy)
            })
            .collect();
        for (topic, policy) in &config.topic_policies {
            if let Some(kind) = EventKind::parse(topic) {
                topic_policies.insert(kind, (*policy).into());
            }
        }

        Self {
            seq: AtomicU64::new(0),
            next_sub_id: AtomicU64::new(1),
            subscriptions: RwLock::new(Vec::new()),
            topic_policies,
            default_capacity: config.subscription_queue,
            grace: Duration::from_secs(config.slow_consumer_grace_secs),
        }
    }

    /// Subscribe to a set of topics with the per-topic policies.
    pub fn subscribe(&self, topics: &[EventKind]) -> Subscription {
        self.subscribe_with(topics, None, None)
    }

    /// Subscribe with an explicit policy override and/or queue capacity.
    pub fn subscribe_with(
        &self,
        topics: &[EventKind],
        policy_override: Option<BackpressurePolicy>,
        capacity: Option<usize>,
    ) -> Subscription {
        let inner = Arc::new(SubscriptionInner {
            id: self.next_sub_id.fetch_add(1, Ordering::Relaxed),
            topics: topics.iter().copied().collect(),
            policy_override,
            capacity: capacity.unwrap_or(self.default_capacity),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            last_delivered: AtomicU64::new(0),
            last_emergency: AtomicU64::new(0),
            disconnected: AtomicBool::new(false),
            full_since: Mutex::new(None),
        });
        if let Ok(mut subs) = self.subscriptions.write() {
            // Opportunistically reap disconnected subscriptions
            subs.retain(|s| !s.disconnected.load(Ordering::Acquire));
            subs.push(inner.clone());
        }
        debug!(subscription = inner.id, topics = topics.len(), "Subscription created");
        Subscription { inner }
    }

    /// Current sequence counter (heartbeat answer).
    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    /// Publish an event to every matching subscription. Returns the assigned
    /// seq. Safe to call from blocking worker threads; under `BlockProducer`
    /// a full queue stalls the caller for at most the grace period.
    pub fn publish(&self, kind: EventKind, payload: serde_json::Value) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::AcqRel) + 1;
        let event = Event {
            seq,
            kind,
            emitted_at: Utc::now(),
            payload,
        };

        let targets: Vec<Arc<SubscriptionInner>> = match self.subscriptions.read() {
            Ok(subs) => subs.iter().filter(|s| s.wants(kind)).cloned().collect(),
            Err(_) => return seq,
        };

        for sub in targets {
            if event.is_emergency() {
                self.enqueue_emergency(&sub, event.clone());
            } else {
                let policy = sub
                    .policy_override
                    .unwrap_or_else(|| self.policy_for(kind));
                self.enqueue(&sub, event.clone(), policy);
            }
        }
        seq
    }

    fn policy_for(&self, kind: EventKind) -> BackpressurePolicy {
        self.topic_policies
            .get(&kind)
            .copied()
            .unwrap_or(BackpressurePolicy::BlockProducer)
    }

    /// Head-of-queue insertion, capacity ignored: emergencies are never
    /// dropped.
    fn enqueue_emergency(&self, sub: &Arc<SubscriptionInner>, event: Event) {
        if let Ok(mut queue) = sub.queue.lock() {
            queue.push_front(event);
        }
        sub.notify.notify_one();
    }

    fn enqueue(&self, sub: &Arc<SubscriptionInner>, event: Event, policy: BackpressurePolicy) {
        match policy {
            BackpressurePolicy::DropOldest => {
                if let Ok(mut queue) = sub.queue.lock() {
                    if queue.len() >= sub.capacity {
                        queue.pop_front();
                        sub.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    queue.push_back(event);
                }
                sub.notify.notify_one();
            }
            BackpressurePolicy::BlockProducer => {
                let start = Instant::now();
                loop {
                    {
                        let Ok(mut queue) = sub.queue.lock() else { return };
                        if queue.len() < sub.capacity {
                            queue.push_back(event);
                            sub.notify.notify_one();
                            return;
                        }
                    }
                    if start.elapsed() >= self.grace {
                        sub.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            subscription = sub.id,
                            kind = %event.kind,
                            "Subscription queue full past grace period; event dropped"
                        );
                        return;
                    }
                    std::thread::sleep(BLOCK_RETRY);
                }
            }
            BackpressurePolicy::DropSubscription => {
                let Ok(mut queue) = sub.queue.lock() else { return };
                if queue.len() < sub.capacity {
                    queue.push_back(event);
                    drop(queue);
                    sub.notify.notify_one();
                    return;
                }
                drop(queue);
                sub.dropped.fetch_add(1, Ordering::Relaxed);
                let expired = {
                    let Ok(mut full_since) = sub.full_since.lock() else { return };
                    let since = full_since.get_or_insert_with(Instant::now);
                    since.elapsed() >= self.grace
                };
                if expired {
                    warn!(
                        subscription = sub.id,
                        "Slow consumer disconnected after grace period"
                    );
                    sub.disconnected.store(true, Ordering::Release);
                    sub.notify.notify_waiters();
                }
            }
        }
    }

    /// Statistics for all live subscriptions.
    pub fn stats(&self) -> Vec<SubscriptionStats> {
        match self.subscriptions.read() {
            Ok(subs) => subs
                .iter()
                .map(|inner| {
                    let queue_depth = inner.queue.lock().map(|q| q.len()).unwrap_or(0);
                    SubscriptionStats {
                        id: inner.id,
                        topics: inner.topics.iter().map(|t| t.to_string()).collect(),
                        policy: inner
                            .policy_override
                            .map_or_else(|| "per-topic".to_string(), |p| p.to_string()),
                        queue_depth,
                        capacity: inner.capacity,
                        delivered: inner.delivered.load(Ordering::Relaxed),
                        dropped: inner.dropped.load(Ordering::Relaxed),
                        disconnected: inner.disconnected.load(Ordering::Acquire),
                    }
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .map(|subs| {
                subs.iter()
                    .filter(|s| !s.disconnected.load(Ordering::Acquire))
                    .count()
            })
            .unwrap_or(0)
    }
}

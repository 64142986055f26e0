//! Event bus: domain events off the request path.
//!
//! DESIGN
//! ======
//! Handlers call [`EventBus::emit`], which does a non-blocking `try_send`
//! into a bounded queue. A single background worker drains the queue in
//! batches (by size or on a timer), persists each batch through
//! [`Store::append_events`], and feeds every event to the
//! [`StruggleDetector`].
//!
//! ERROR HANDLING
//! ==============
//! A full or closed queue drops the event with a warning; tutoring never
//! waits on analytics. Failed batch writes are retried with linear backoff
//! and then dropped. Alerts are written individually so a bad event batch
//! cannot hide one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::env_parse;
use crate::models::{Alert, Event, EventTopic, Priority};
use crate::store::Store;

const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 4096;
const DEFAULT_EVENT_BATCH_SIZE: usize = 64;
const DEFAULT_EVENT_FLUSH_MS: u64 = 250;
const DEFAULT_EVENT_RETRIES: usize = 3;
const DEFAULT_EVENT_RETRY_BASE_MS: u64 = 50;

/// Execution outcomes remembered per learner.
const STRUGGLE_WINDOW: usize = 10;
/// Consecutive failed executions that raise an alert.
const STRUGGLE_THRESHOLD: usize = 3;
/// Learners whose windows are kept; the least recently active is evicted.
const MAX_TRACKED_LEARNERS: usize = 10_000;

pub const STRUGGLE_ALERT: &str = "STRUGGLE_ALERT";

/// Tuning knobs for the event worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_ms: u64,
    pub retries: usize,
    pub retry_base_ms: u64,
}

impl EventConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            queue_capacity: env_parse("EVENT_QUEUE_CAPACITY", DEFAULT_EVENT_QUEUE_CAPACITY).max(1),
            batch_size: env_parse("EVENT_BATCH_SIZE", DEFAULT_EVENT_BATCH_SIZE).max(1),
            flush_ms: env_parse("EVENT_FLUSH_MS", DEFAULT_EVENT_FLUSH_MS).max(1),
            retries: env_parse("EVENT_RETRIES", DEFAULT_EVENT_RETRIES).max(1),
            retry_base_ms: env_parse("EVENT_RETRY_BASE_MS", DEFAULT_EVENT_RETRY_BASE_MS),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            batch_size: DEFAULT_EVENT_BATCH_SIZE,
            flush_ms: DEFAULT_EVENT_FLUSH_MS,
            retries: DEFAULT_EVENT_RETRIES,
            retry_base_ms: DEFAULT_EVENT_RETRY_BASE_MS,
        }
    }
}

// =============================================================================
// BUS
// =============================================================================

/// Cheap-to-clone sending half of the event queue.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

impl EventBus {
    /// Create a bus and the receiver a worker should drain.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create a bus with a running persistence worker.
    #[must_use]
    pub fn spawn(store: Arc<dyn Store>, config: EventConfig) -> (Self, JoinHandle<()>) {
        let (bus, rx) = Self::channel(config.queue_capacity);
        let handle = spawn_worker(store, rx, config);
        (bus, handle)
    }

    /// Queue an event. Returns `false` when it was dropped.
    pub fn emit(&self, topic: EventTopic, user_id: &str, payload: serde_json::Value) -> bool {
        self.send(Event::new(topic, user_id, payload))
    }

    pub fn send(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(topic = %event.topic, user_id = %event.user_id, "event queue full; dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(topic = %event.topic, user_id = %event.user_id, "event queue closed; dropping event");
                false
            }
        }
    }

    /// Whether the worker is still accepting events.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// Spawn the batch writer. It exits once every sender is dropped and the
/// queue is drained.
pub fn spawn_worker(store: Arc<dyn Store>, mut rx: mpsc::Receiver<Event>, config: EventConfig) -> JoinHandle<()> {
    info!(
        queue_capacity = config.queue_capacity,
        batch_size = config.batch_size,
        flush_ms = config.flush_ms,
        retries = config.retries,
        "event worker configured"
    );

    tokio::spawn(async move {
        let mut batch: Vec<Event> = Vec::with_capacity(config.batch_size);
        let mut detector = StruggleDetector::new();
        let mut ticker = tokio::time::interval(Duration::from_millis(config.flush_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    let Some(event) = maybe_event else {
                        flush_with_retry(store.as_ref(), &mut batch, config).await;
                        break;
                    };
                    if let Some(alert) = detector.observe(&event) {
                        raise_alert(store.as_ref(), &alert, &mut batch).await;
                    }
                    batch.push(event);
                    if batch.len() >= config.batch_size {
                        flush_with_retry(store.as_ref(), &mut batch, config).await;
                    }
                }
                _ = ticker.tick() => {
                    flush_with_retry(store.as_ref(), &mut batch, config).await;
                }
            }
        }
        info!("event worker stopped");
    })
}

async fn raise_alert(store: &dyn Store, alert: &Alert, batch: &mut Vec<Event>) {
    warn!(user_id = %alert.user_id, reason = %alert.reason, "events: learner struggling");
    if let Err(e) = store.insert_alert(alert).await {
        error!(error = %e, user_id = %alert.user_id, "events: alert insert failed");
    }
    batch.push(Event::new(
        EventTopic::TeacherAlerts,
        &alert.user_id,
        json!({
            "type": alert.kind,
            "alert_id": alert.id,
            "reason": alert.reason,
            "severity": alert.severity,
        }),
    ));
}

async fn flush_with_retry(store: &dyn Store, batch: &mut Vec<Event>, config: EventConfig) {
    if batch.is_empty() {
        return;
    }

    let drained = std::mem::take(batch);
    for attempt in 1..=config.retries {
        match store.append_events(&drained).await {
            Ok(()) => return,
            Err(e) if attempt < config.retries => {
                warn!(error = %e, attempt, total = config.retries, count = drained.len(), "event batch persist failed; retrying");
                tokio::time::sleep(Duration::from_millis(attempt as u64 * config.retry_base_ms)).await;
            }
            Err(e) => {
                error!(error = %e, count = drained.len(), "event batch persist failed after retries; dropping events");
                return;
            }
        }
    }
}

// =============================================================================
// STRUGGLE DETECTION
// =============================================================================

/// Payload for a code execution event, in the shape the detector reads.
#[must_use]
pub fn code_execution_payload(status: &str, execution_time: f64) -> serde_json::Value {
    json!({ "type": "code_execution", "status": status, "execution_time": execution_time })
}

#[derive(Debug, Default)]
struct LearnerWindow {
    outcomes: VecDeque<bool>,
    last_seen: u64,
}

/// Watches code execution outcomes and flags learners who keep failing.
#[derive(Debug)]
pub struct StruggleDetector {
    windows: HashMap<String, LearnerWindow>,
    capacity: usize,
    clock: u64,
}

impl Default for StruggleDetector {
    fn default() -> Self {
        Self::with_capacity(MAX_TRACKED_LEARNERS)
    }
}

impl StruggleDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector that remembers at most `capacity` learners.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { windows: HashMap::new(), capacity: capacity.max(1), clock: 0 }
    }

    /// Feed one event. Returns an alert when the learner's latest
    /// executions all failed; their window is then cleared.
    pub fn observe(&mut self, event: &Event) -> Option<Alert> {
        if event.topic != EventTopic::UserInteractions {
            return None;
        }
        if event.payload.get("type").and_then(serde_json::Value::as_str) != Some("code_execution") {
            return None;
        }
        let succeeded = event.payload.get("status").and_then(serde_json::Value::as_str) == Some("success");

        if !self.windows.contains_key(&event.user_id) && self.windows.len() >= self.capacity {
            self.evict_idle();
        }
        self.clock += 1;
        let window = self.windows.entry(event.user_id.clone()).or_default();
        window.last_seen = self.clock;
        if window.outcomes.len() == STRUGGLE_WINDOW {
            window.outcomes.pop_front();
        }
        window.outcomes.push_back(succeeded);

        let failing = window.outcomes.len() >= STRUGGLE_THRESHOLD
            && window.outcomes.iter().rev().take(STRUGGLE_THRESHOLD).all(|ok| !ok);
        if !failing {
            return None;
        }
        self.windows.remove(&event.user_id);
        Some(Alert {
            id: Uuid::new_v4(),
            user_id: event.user_id.clone(),
            kind: STRUGGLE_ALERT.to_string(),
            reason: format!("{STRUGGLE_THRESHOLD} consecutive code execution failures"),
            severity: Priority::High,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    fn evict_idle(&mut self) {
        let idle = self
            .windows
            .iter()
            .min_by_key(|(_, window)| window.last_seen)
            .map(|(user_id, _)| user_id.clone());
        if let Some(user_id) = idle {
            self.windows.remove(&user_id);
        }
    }

    /// Outcomes currently remembered for a learner, oldest first.
    #[cfg(test)]
    #[must_use]
    pub fn window(&self, user_id: &str) -> Vec<bool> {
        self.windows
            .get(user_id)
            .map(|w| w.outcomes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of learners currently tracked.
    #[cfg(test)]
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;

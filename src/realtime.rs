//! Realtime change feed: topic-filtered pub/sub over bounded queues.
//!
//! DESIGN
//! ======
//! Each subscriber owns a bounded `mpsc` queue registered under one topic.
//! Publishers never wait: a full queue drops the event with a warning and a
//! closed queue unregisters its subscriber. A `Subscription` unregisters on
//! `Drop`, so a websocket task that exits for any reason stops receiving.
//!
//! SYSTEM CONTEXT
//! ==============
//! `services::session` publishes session inserts and session-start
//! notifications; `services::auth` publishes auth-state transitions;
//! `routes::realtime` forwards a subscription to a websocket.
//! `AppState::shutdown` calls `close()` to end every stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Notification, Profile, Session};

// =============================================================================
// EVENTS
// =============================================================================

/// Subscription filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Session inserts for appointments belonging to one psychiatrist.
    PsychiatristSessions(Uuid),
    /// Notifications and auth transitions addressed to one user.
    User(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTransition {
    SignedIn,
    SignedOut,
    ProfileUpdated,
}

/// Server-to-client message, serialized as `{"event": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum RealtimeEvent {
    #[serde(rename = "realtime:connected")]
    Connected { topic: String },
    #[serde(rename = "session:insert")]
    SessionInsert { session: Session },
    #[serde(rename = "notification:insert")]
    NotificationInsert { notification: Notification },
    #[serde(rename = "auth:changed")]
    AuthChanged { transition: AuthTransition, profile: Option<Profile> },
}

// =============================================================================
// FEED
// =============================================================================

struct Subscriber {
    topic: Topic,
    tx: mpsc::Sender<RealtimeEvent>,
}

struct FeedInner {
    capacity: usize,
    closed: AtomicBool,
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
}

impl FeedInner {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<Uuid, Subscriber>> {
        // The map holds no invariant a panicking holder could break.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to the process-wide change feed.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a subscriber for `topic`. After `close()` the returned
    /// subscription is already ended.
    #[must_use]
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = Uuid::new_v4();
        // `close` takes the same lock, so the flag cannot flip before the insert.
        let mut subscribers = self.inner.subscribers();
        if self.inner.closed.load(Ordering::Acquire) {
            debug!(?topic, "subscribe after feed close");
        } else {
            subscribers.insert(id, Subscriber { topic, tx });
        }
        drop(subscribers);
        Subscription { id, topic, rx, feed: Arc::downgrade(&self.inner) }
    }

    /// Deliver `event` to every subscriber of `topic`. Returns the number of
    /// queues that accepted it.
    pub fn publish(&self, topic: Topic, event: &RealtimeEvent) -> usize {
        let mut delivered = 0;
        let mut subscribers = self.inner.subscribers();
        subscribers.retain(|id, sub| {
            if sub.topic != topic {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %id, ?topic, "realtime queue full; dropping event");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }

    /// End every subscription and refuse new ones.
    pub fn close(&self) {
        let dropped = {
            let mut subscribers = self.inner.subscribers();
            self.inner.closed.store(true, Ordering::Release);
            std::mem::take(&mut *subscribers)
        };
        debug!(count = dropped.len(), "realtime feed closed");
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Receiving half of one registration. Unregisters on drop.
pub struct Subscription {
    id: Uuid,
    topic: Topic,
    rx: mpsc::Receiver<RealtimeEvent>,
    feed: Weak<FeedInner>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next event, or `None` once unsubscribed or the feed is closed.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            feed.subscribers().remove(&self.id);
        }
    }
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;

//! Reset fan-out between presenters bound to the same metric source.
//!
//! The bus is an explicit observer registry. Each presenter subscribes when it
//! is built and its [`ResetSubscription`] unsubscribes on drop. Broadcasting
//! never blocks: every subscriber owns a small bounded channel. When it is
//! full the oldest pending notice is evicted to make room, so the newest
//! instant always arrives.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

/// Per-subscriber channel depth.
pub const DEFAULT_NOTICE_CAPACITY: usize = 16;

/// A reset performed by one presenter, as seen by the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetNotice {
    pub at: DateTime<Utc>,
    /// Subscription id of the presenter that performed the reset.
    pub origin: u64,
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    tx: Sender<ResetNotice>,
    /// Bus-side handle on the same channel, used to evict the oldest notice.
    evict: Receiver<ResetNotice>,
}

/// Registry of presenters sharing one set of cumulative counters.
#[derive(Debug)]
pub struct ResetBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    notice_capacity: usize,
    dropped_notices: AtomicU64,
}

impl Default for ResetBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NOTICE_CAPACITY)
    }
}

impl ResetBus {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bus whose subscribers each buffer at most `notice_capacity` notices.
    #[must_use]
    pub fn with_capacity(notice_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            notice_capacity: notice_capacity.max(1),
            dropped_notices: AtomicU64::new(0),
        }
    }

    pub fn subscribe(self: &Arc<Self>) -> ResetSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(self.notice_capacity);
        self.subscribers.lock().push(Subscriber {
            id,
            tx,
            evict: rx.clone(),
        });
        ResetSubscription {
            id,
            rx,
            bus: Arc::downgrade(self),
        }
    }

    /// Deliver `at` to every subscriber except `origin`. Returns how many
    /// subscribers received it.
    ///
    /// A full subscriber loses its oldest pending notice, counted in
    /// [`dropped_notices`](Self::dropped_notices).
    pub fn broadcast(&self, origin: u64, at: DateTime<Utc>) -> usize {
        let notice = ResetNotice { at, origin };
        let mut delivered = 0;
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            if sub.id == origin {
                return true;
            }
            let mut pending = notice;
            loop {
                match sub.tx.try_send(pending) {
                    Ok(()) => {
                        delivered += 1;
                        return true;
                    }
                    Err(TrySendError::Full(back)) => {
                        pending = back;
                        if sub.evict.try_recv().is_ok() {
                            self.dropped_notices.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(TrySendError::Disconnected(_)) => return false,
                }
            }
        });
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    #[must_use]
    pub fn dropped_notices(&self) -> u64 {
        self.dropped_notices.load(Ordering::Relaxed)
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().retain(|sub| sub.id != id);
    }
}

/// One presenter's membership in a [`ResetBus`].
#[derive(Debug)]
pub struct ResetSubscription {
    id: u64,
    rx: Receiver<ResetNotice>,
    bus: Weak<ResetBus>,
}

impl ResetSubscription {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Drain pending notices and return the most recent reset instant.
    pub fn take_latest(&self) -> Option<DateTime<Utc>> {
        self.rx.try_iter().map(|notice| notice.at).max()
    }
}

impl Drop for ResetSubscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

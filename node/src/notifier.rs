// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Fan-out of committed reports to stream subscribers.
//!
//! Built on a `tokio::sync::broadcast` channel. Every receiver has its own
//! cursor into a ring of `capacity` reports (rounded up to a power of two).
//! Publishing never waits on a receiver: a receiver that falls a full ring
//! behind skips its oldest pending reports and counts them. Reports are
//! delivered in publish order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use busline_kernel::LocationReport;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::telemetry::{NOTIFICATIONS_DROPPED, STREAM_SUBSCRIBERS};

pub type SubscriptionId = u64;

type Feed = broadcast::Sender<Arc<LocationReport>>;

struct NotifierInner {
    // `None` once closed for shutdown.
    sender: Mutex<Option<Feed>>,
    next_id: AtomicU64,
}

impl NotifierInner {
    fn receiver_count(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Feed::receiver_count)
    }
}

/// Registry of live subscriptions. Cheap to clone.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub const DEFAULT_CAPACITY: usize = 64;

    /// `capacity` is the per-subscriber backlog bound (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(NotifierInner {
                sender: Mutex::new(Some(sender)),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// A subscription taken after `close_all` is already closed.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (receiver, count) = {
            let sender = self.inner.sender.lock().unwrap_or_else(PoisonError::into_inner);
            match sender.as_ref() {
                Some(feed) => (feed.subscribe(), feed.receiver_count()),
                None => (broadcast::channel(1).1, 0),
            }
        };
        metrics::gauge!(STREAM_SUBSCRIBERS, count as f64);
        tracing::debug!("subscriber {} registered ({} live)", id, count);

        Subscription {
            id,
            receiver,
            dropped: 0,
            notifier: Arc::clone(&self.inner),
        }
    }

    /// Releases a subscription. Same as dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Offers `report` to every live subscriber and returns how many got it.
    pub fn publish(&self, report: &Arc<LocationReport>) -> usize {
        let sender = self.inner.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            // Err only means nobody is listening.
            Some(feed) => feed.send(Arc::clone(report)).unwrap_or(0),
            None => 0,
        }
    }

    /// Closes every subscription; pending reports are still delivered,
    /// then `recv` returns `None`. Used on shutdown.
    pub fn close_all(&self) {
        let feed = self.inner.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(feed);
        metrics::gauge!(STREAM_SUBSCRIBERS, 0.0);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// One viewer's view of the notification feed. Unsubscribes on drop.
pub struct Subscription {
    id: SubscriptionId,
    receiver: broadcast::Receiver<Arc<LocationReport>>,
    dropped: u64,
    notifier: Arc<NotifierInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    fn lagged(&mut self, skipped: u64) {
        self.dropped += skipped;
        metrics::counter!(NOTIFICATIONS_DROPPED, skipped);
        tracing::debug!("subscriber {} fell behind, skipped {}", self.id, skipped);
    }

    /// Waits for the next report. `None` once the subscription is closed
    /// and drained.
    pub async fn recv(&mut self) -> Option<Arc<LocationReport>> {
        loop {
            match self.receiver.recv().await {
                Ok(report) => return Some(report),
                Err(RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Arc<LocationReport>> {
        loop {
            match self.receiver.try_recv() {
                Ok(report) => return Some(report),
                Err(TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently pending, oldest first.
    pub fn drain(&mut self) -> Vec<Arc<LocationReport>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Reports skipped because this subscriber fell behind. Counted as the
    /// subscriber reads past the gap.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Our receiver is still counted until this returns.
        let live = self.notifier.receiver_count().saturating_sub(1);
        metrics::gauge!(STREAM_SUBSCRIBERS, live as f64);
        tracing::debug!("subscriber {} released ({} dropped)", self.id, self.dropped);
    }
}

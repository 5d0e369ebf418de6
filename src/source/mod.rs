//! Subscription sources feeding live projections.
//!
//! A source accepts a [`CollectionQuery`] and pushes full-collection
//! snapshots into a [`NotificationSink`] every time the collection changes,
//! until the returned [`Disposer`] is invoked. At most one terminal
//! failure is pushed per subscription.
//!
//! # Example
//!
//! ```ignore
//! let source = MemorySource::new();
//! let scope = ScopeKey::new("uid-1");
//! source.set(&scope, RawRecord::new("t1").with_field("name", "alpha"));
//!
//! let mut projection = LiveProjection::new(source.clone(), ProjectionConfig::default())?;
//! let handle = projection.activate(scope);
//! projection.process_pending();
//! ```

mod memory;

pub use memory::MemorySource;

use crate::types::{CollectionQuery, RawRecord, SubscriptionFailure};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::sync::Arc;

/// A remote store that can serve live, ordered collection queries.
pub trait SubscriptionSource: Send + Sync {
    /// Start a subscription. Notifications go to `sink` until the returned
    /// disposer is invoked.
    fn subscribe(&self, query: &CollectionQuery, sink: NotificationSink) -> Disposer;
}

impl<S: SubscriptionSource + ?Sized> SubscriptionSource for Arc<S> {
    fn subscribe(&self, query: &CollectionQuery, sink: NotificationSink) -> Disposer {
        (**self).subscribe(query, sink)
    }
}

/// Message delivered from a source to a projection.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Full ordered listing of the collection.
    Snapshot(Vec<RawRecord>),
    /// Terminal failure of the subscription.
    Failure(SubscriptionFailure),
}

/// Outcome of pushing a notification into a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The receiving side is gone.
    Closed,
}

/// Sending half of one subscription's notification channel.
///
/// The channel is unbounded: every notification pushed while the receiver
/// is alive is kept until the projection applies or discards it.
#[derive(Clone)]
pub struct NotificationSink {
    sender: Sender<Notification>,
}

impl NotificationSink {
    /// Push a snapshot.
    pub fn snapshot(&self, records: Vec<RawRecord>) -> Delivery {
        self.deliver(Notification::Snapshot(records))
    }

    /// Push a terminal failure.
    pub fn fail(&self, failure: SubscriptionFailure) -> Delivery {
        self.deliver(Notification::Failure(failure))
    }

    pub fn deliver(&self, notification: Notification) -> Delivery {
        match self.sender.send(notification) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Closed,
        }
    }
}

impl fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSink")
            .field("queued", &self.sender.len())
            .finish()
    }
}

/// Receiving half of one subscription's notification channel.
pub(crate) struct NotificationQueue {
    pub(crate) receiver: Receiver<Notification>,
}

/// Create the notification channel of one subscription.
pub(crate) fn notification_channel() -> (NotificationSink, NotificationQueue) {
    let (sender, receiver) = unbounded();
    (NotificationSink { sender }, NotificationQueue { receiver })
}

/// One-shot release of a subscription.
///
/// Invoking it again after the first time does nothing.
pub struct Disposer {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Disposer {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A disposer with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn dispose(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.release.is_none()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

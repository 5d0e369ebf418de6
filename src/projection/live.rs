//! Live projection driver.

use super::handle::ProjectionHandle;
use super::mapper::{map_snapshot, DomainRecordMapper, RecordMapper};
use super::state::ProjectionState;
use crate::config::ProjectionConfig;
use crate::error::Result;
use crate::source::{notification_channel, Notification, NotificationQueue, SubscriptionSource};
use crate::types::{CollectionQuery, ScopeKey};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type Observer<T> = Box<dyn FnMut(&ProjectionState<T>) + Send>;

/// The subscription currently owned by a projection.
struct ActiveSubscription {
    handle: ProjectionHandle,
    queue: NotificationQueue,
}

/// Read-only view of a projection's state, shareable across threads.
pub struct ProjectionReader<T> {
    state: Arc<RwLock<ProjectionState<T>>>,
}

impl<T> Clone for ProjectionReader<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone> ProjectionReader<T> {
    pub fn state(&self) -> ProjectionState<T> {
        self.state.read().clone()
    }

    pub fn data(&self) -> Option<Arc<Vec<T>>> {
        self.state.read().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn error(&self) -> String {
        self.state.read().error.clone()
    }
}

/// Keeps an ordered, typed view of one remote collection up to date.
///
/// Owns at most one subscription at a time. Notifications are queued by the
/// source and applied, in delivery order, only by [`process_pending`] and
/// [`wait_for_update`]. Once the handle is closed every queued notification
/// is discarded, including when it is closed from another thread.
///
/// [`process_pending`]: LiveProjection::process_pending
/// [`wait_for_update`]: LiveProjection::wait_for_update
pub struct LiveProjection<S: SubscriptionSource, M: RecordMapper = DomainRecordMapper> {
    source: S,
    config: ProjectionConfig,
    mapper: M,
    state: Arc<RwLock<ProjectionState<M::Output>>>,
    active: Option<ActiveSubscription>,
    observers: Vec<Observer<M::Output>>,
}

impl<S: SubscriptionSource> LiveProjection<S> {
    /// Create a projection producing [`DomainRecord`](crate::DomainRecord)s.
    pub fn new(source: S, config: ProjectionConfig) -> Result<Self> {
        let mapper = DomainRecordMapper::from_config(&config)?;
        Self::with_mapper(source, config, mapper)
    }
}

impl<S: SubscriptionSource, M: RecordMapper> LiveProjection<S, M> {
    /// Create a projection with a custom mapper.
    pub fn with_mapper(source: S, config: ProjectionConfig, mapper: M) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            mapper,
            state: Arc::new(RwLock::new(ProjectionState::default())),
            active: None,
            observers: Vec::new(),
        })
    }

    /// Open a subscription for `scope`, replacing any previous one.
    ///
    /// The previous subscription is released before the new one is opened.
    /// State is reset to loading with no data and no error.
    pub fn activate(&mut self, scope: impl Into<ScopeKey>) -> ProjectionHandle {
        let scope = scope.into();
        self.release_active();

        let query = CollectionQuery {
            scope: scope.clone(),
            collection: self.config.collection.clone(),
            order_by: self.config.order_by.clone(),
            direction: self.config.direction,
        };

        *self.state.write() = ProjectionState::loading();

        let (sink, queue) = notification_channel();
        let disposer = self.source.subscribe(&query, sink);
        let handle = ProjectionHandle::new(scope, disposer);

        info!(
            handle = %handle.id(),
            path = %query.path(),
            order_by = %query.order_by,
            direction = ?query.direction,
            "subscription opened"
        );

        self.active = Some(ActiveSubscription {
            handle: handle.clone(),
            queue,
        });
        self.notify_observers();
        handle
    }

    /// Release a subscription. Closed or foreign handles are a no-op for
    /// this projection's state.
    pub fn deactivate(&mut self, handle: &ProjectionHandle) {
        if !handle.close() {
            debug!(handle = %handle.id(), "handle already closed");
        }
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.handle.same_as(handle))
        {
            self.active = None;
        }
    }

    /// Apply every queued notification without blocking.
    ///
    /// Returns the number of notifications applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let next = match self.live_queue() {
                Some(queue) => queue.receiver.try_recv().ok(),
                None => None,
            };
            let Some(notification) = next else {
                break;
            };
            if self.apply(notification) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait up to `timeout` for the next notification and apply it.
    ///
    /// Returns whether the state changed.
    pub fn wait_for_update(&mut self, timeout: Duration) -> bool {
        let next = match self.live_queue() {
            Some(queue) => queue.receiver.recv_timeout(timeout).ok(),
            None => return false,
        };
        match next {
            Some(notification) => self.apply(notification),
            None => false,
        }
    }

    /// Register an observer called after every state change.
    ///
    /// Observers may close the active handle; queued notifications are then
    /// dropped.
    pub fn on_change(&mut self, observer: impl FnMut(&ProjectionState<M::Output>) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn reader(&self) -> ProjectionReader<M::Output> {
        ProjectionReader {
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> ProjectionState<M::Output> {
        self.state.read().clone()
    }

    pub fn data(&self) -> Option<Arc<Vec<M::Output>>> {
        self.state.read().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn error(&self) -> String {
        self.state.read().error.clone()
    }

    /// Handle of the open subscription, if any.
    pub fn handle(&self) -> Option<&ProjectionHandle> {
        self.active
            .as_ref()
            .map(|active| &active.handle)
            .filter(|handle| !handle.is_closed())
    }

    /// Scope of the open subscription, if any.
    pub fn scope(&self) -> Option<&ScopeKey> {
        self.handle().map(ProjectionHandle::scope)
    }

    pub fn is_active(&self) -> bool {
        self.handle().is_some()
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Queue of the open subscription. Forgets the subscription once its
    /// handle has been closed elsewhere.
    fn live_queue(&mut self) -> Option<&NotificationQueue> {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.handle.is_closed())
        {
            debug!("dropping queue of closed subscription");
            self.active = None;
        }
        self.active.as_ref().map(|active| &active.queue)
    }

    fn release_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.close();
        }
    }

    /// Apply one notification unless the subscription was closed meanwhile.
    /// Returns whether the state changed.
    fn apply(&mut self, notification: Notification) -> bool {
        let Some(handle) = self.active.as_ref().map(|active| active.handle.clone()) else {
            return false;
        };
        let state = &self.state;

        let written = match notification {
            Notification::Snapshot(records) => {
                match map_snapshot(&self.mapper, &records, self.config.malformed_records) {
                    Ok(data) => {
                        let applied = data.len();
                        handle.while_open(|| state.write().apply_snapshot(data)).map(|()| {
                            debug!(received = records.len(), applied, "snapshot applied");
                        })
                    }
                    Err(e) => {
                        warn!(error = %e, "snapshot rejected");
                        handle.while_open(|| state.write().apply_failure(e.to_string()))
                    }
                }
            }
            Notification::Failure(failure) => {
                warn!(error = %failure, "subscription failed");
                handle.while_open(|| state.write().apply_failure(failure.message))
            }
        };

        if written.is_none() {
            debug!(handle = %handle.id(), "notification discarded, handle closed");
            return false;
        }
        self.notify_observers();
        true
    }

    fn notify_observers(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.state.read().clone();
        for observer in self.observers.iter_mut() {
            observer(&snapshot);
        }
    }
}

impl<S: SubscriptionSource, M: RecordMapper> Drop for LiveProjection<S, M> {
    fn drop(&mut self) {
        self.release_active();
    }
}

//! In-process subscription source.

use super::{Delivery, Disposer, NotificationSink, SubscriptionSource};
use crate::types::{
    collection_path, CollectionQuery, FieldValue, OrderDirection, RawRecord, ScopeKey,
    ServerTimestamp, SubscriptionFailure,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Message used for scopes rejected with [`MemorySource::deny`].
const PERMISSION_DENIED: &str = "permission-denied";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct WatchId(u64);

/// A live query registered against a collection.
struct Watch {
    query: CollectionQuery,
    path: String,
    sink: NotificationSink,
}

/// Position of a record under an order-by field. Pending timestamps without
/// a previous value sort after every finalized instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    At(DateTime<Utc>),
    Pending,
}

fn sort_key(record: &RawRecord, field: &str) -> Option<SortKey> {
    match record.get(field) {
        Some(FieldValue::Timestamp(ServerTimestamp::Finalized { at })) => Some(SortKey::At(*at)),
        Some(FieldValue::Timestamp(ServerTimestamp::Pending { previous: Some(at) })) => {
            Some(SortKey::At(*at))
        }
        Some(FieldValue::Timestamp(ServerTimestamp::Pending { previous: None })) => {
            Some(SortKey::Pending)
        }
        _ => None,
    }
}

#[derive(Default)]
struct Inner {
    /// Documents by collection path, then by id.
    collections: RwLock<HashMap<String, HashMap<String, RawRecord>>>,
    watches: RwLock<HashMap<WatchId, Watch>>,
    denied: RwLock<HashSet<ScopeKey>>,
    next_id: AtomicU64,
    disposals: AtomicUsize,
}

impl Inner {
    /// Ordered listing of a collection as seen by `query`.
    ///
    /// Records without a timestamp under the order-by field are not part of
    /// an ordered query's results.
    fn listing(&self, path: &str, query: &CollectionQuery) -> Vec<RawRecord> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(path) else {
            return Vec::new();
        };

        let mut keyed: Vec<(SortKey, &RawRecord)> = docs
            .values()
            .filter_map(|record| sort_key(record, &query.order_by).map(|key| (key, record)))
            .collect();

        keyed.sort_by(|(ka, a), (kb, b)| {
            let ord = ka.cmp(kb).then_with(|| a.id.cmp(&b.id));
            match query.direction {
                OrderDirection::Ascending => ord,
                OrderDirection::Descending => ord.reverse(),
            }
        });

        keyed.into_iter().map(|(_, record)| record.clone()).collect()
    }

    /// Push a fresh snapshot to every watch on `path`. Drops watches whose
    /// receiver is gone.
    fn broadcast(&self, path: &str) {
        let mut to_remove = Vec::new();

        {
            let watches = self.watches.read();
            for (id, watch) in watches.iter().filter(|(_, w)| w.path == path) {
                let records = self.listing(path, &watch.query);
                if watch.sink.snapshot(records) == Delivery::Closed {
                    debug!(path, watch = id.0, "receiver gone, dropping watch");
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut watches = self.watches.write();
            for id in to_remove {
                watches.remove(&id);
            }
        }
    }
}

/// In-process collection store serving live ordered queries.
///
/// Every write pushes a full snapshot to every live subscription on the
/// written collection. Collections are addressed as
/// `users/{scope}/{collection}`.
#[derive(Clone)]
pub struct MemorySource {
    inner: Arc<Inner>,
    collection: String,
}

impl MemorySource {
    /// Source whose write helpers target the "tags" collection.
    pub fn new() -> Self {
        Self::with_collection("tags")
    }

    /// Source whose write helpers target `collection`.
    pub fn with_collection(collection: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            collection: collection.into(),
        }
    }

    fn path(&self, scope: &ScopeKey) -> String {
        collection_path(scope, &self.collection)
    }

    /// Insert or replace a record.
    ///
    /// A pending timestamp replacing a finalized one remembers the finalized
    /// value as its previous value.
    pub fn set(&self, scope: &ScopeKey, mut record: RawRecord) {
        let path = self.path(scope);
        {
            let mut collections = self.inner.collections.write();
            let docs = collections.entry(path.clone()).or_default();
            if let Some(existing) = docs.get(&record.id) {
                for (field, value) in record.fields.iter_mut() {
                    let FieldValue::Timestamp(ServerTimestamp::Pending { previous }) = value else {
                        continue;
                    };
                    if previous.is_some() {
                        continue;
                    }
                    if let Some(FieldValue::Timestamp(ServerTimestamp::Finalized { at })) =
                        existing.get(field)
                    {
                        *previous = Some(*at);
                    }
                }
            }
            debug!(path = %path, record = %record.id, "set record");
            docs.insert(record.id.clone(), record);
        }
        self.inner.broadcast(&path);
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove(&self, scope: &ScopeKey, id: &str) -> bool {
        let path = self.path(scope);
        let removed = self
            .inner
            .collections
            .write()
            .get_mut(&path)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            debug!(path = %path, record = id, "removed record");
            self.inner.broadcast(&path);
        }
        removed
    }

    /// Finalize a server timestamp field. Returns whether the record existed.
    pub fn finalize(&self, scope: &ScopeKey, id: &str, field: &str, at: DateTime<Utc>) -> bool {
        let path = self.path(scope);
        let updated = {
            let mut collections = self.inner.collections.write();
            match collections.get_mut(&path).and_then(|docs| docs.get_mut(id)) {
                Some(record) => {
                    record.set(field, ServerTimestamp::finalized(at));
                    true
                }
                None => false,
            }
        };
        if updated {
            self.inner.broadcast(&path);
        }
        updated
    }

    /// Terminate every live subscription on the scope with a failure.
    pub fn fail(&self, scope: &ScopeKey, message: &str) {
        let path = self.path(scope);
        let mut watches = self.inner.watches.write();
        watches.retain(|id, watch| {
            if watch.path != path {
                return true;
            }
            warn!(path = %path, watch = id.0, message, "failing subscription");
            if watch.sink.fail(SubscriptionFailure::new(message)) == Delivery::Closed {
                debug!(path = %path, watch = id.0, "failure not delivered, receiver gone");
            }
            false
        });
    }

    /// Reject future subscriptions on the scope with "permission-denied".
    pub fn deny(&self, scope: &ScopeKey) {
        self.inner.denied.write().insert(scope.clone());
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.watches.read().len()
    }

    /// Number of times any disposer handed out by this source has run.
    pub fn disposal_count(&self) -> usize {
        self.inner.disposals.load(Ordering::SeqCst)
    }

    /// Current ordered listing, as a subscription with `query` would see it.
    pub fn listing(&self, query: &CollectionQuery) -> Vec<RawRecord> {
        self.inner.listing(&query.path(), query)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionSource for MemorySource {
    fn subscribe(&self, query: &CollectionQuery, sink: NotificationSink) -> Disposer {
        let inner = self.inner.clone();

        if self.inner.denied.read().contains(&query.scope) {
            warn!(scope = %query.scope, "subscription denied");
            if sink.fail(SubscriptionFailure::new(PERMISSION_DENIED)) == Delivery::Closed {
                debug!(scope = %query.scope, "denial not delivered, receiver gone");
            }
            return Disposer::new(move || {
                inner.disposals.fetch_add(1, Ordering::SeqCst);
            });
        }

        let id = WatchId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let path = query.path();

        // Initial load goes out before the watch is visible to writers.
        let initial = self.inner.listing(&path, query);
        match sink.snapshot(initial) {
            Delivery::Delivered => {
                self.inner.watches.write().insert(
                    id,
                    Watch {
                        query: query.clone(),
                        path: path.clone(),
                        sink,
                    },
                );
            }
            outcome => warn!(path = %path, ?outcome, "initial snapshot not delivered"),
        }
        debug!(path = %path, watch = id.0, "subscribed");

        Disposer::new(move || {
            inner.disposals.fetch_add(1, Ordering::SeqCst);
            if inner.watches.write().remove(&id).is_some() {
                debug!(watch = id.0, "unsubscribed");
            }
        })
    }
}

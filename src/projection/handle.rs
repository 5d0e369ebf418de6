//! Subscription handles.

use crate::source::Disposer;
use crate::types::ScopeKey;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Shared {
    id: HandleId,
    scope: ScopeKey,
    closed: AtomicBool,
    /// Held while closing and while a notification is written to state.
    gate: Mutex<()>,
    disposer: Mutex<Disposer>,
}

/// Caller-held token for one subscription.
///
/// Clones refer to the same subscription. Closing is idempotent and may be
/// done from any thread, including from inside a state observer. Once
/// [`close`](ProjectionHandle::close) returns, the owning projection makes no
/// further state changes for this subscription.
#[derive(Clone)]
pub struct ProjectionHandle {
    shared: Arc<Shared>,
}

impl ProjectionHandle {
    pub(crate) fn new(scope: ScopeKey, disposer: Disposer) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst)),
                scope,
                closed: AtomicBool::new(false),
                gate: Mutex::new(()),
                disposer: Mutex::new(disposer),
            }),
        }
    }

    pub fn id(&self) -> HandleId {
        self.shared.id
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.shared.scope
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Release the subscription. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        {
            let _gate = self.shared.gate.lock();
            if self.shared.closed.swap(true, Ordering::SeqCst) {
                return false;
            }
        }
        // Take the disposer out first so a re-entrant close cannot deadlock.
        let mut disposer = std::mem::replace(&mut *self.shared.disposer.lock(), Disposer::noop());
        disposer.dispose();
        info!(handle = %self.shared.id, scope = %self.shared.scope, "subscription closed");
        true
    }

    /// Run `f` only while the handle is open. A concurrent `close` waits for
    /// `f` to finish; `f` never starts after `close` has begun.
    pub(crate) fn while_open<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _gate = self.shared.gate.lock();
        if self.is_closed() {
            return None;
        }
        Some(f())
    }

    /// Whether both handles refer to the same subscription.
    pub fn same_as(&self, other: &ProjectionHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for ProjectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionHandle")
            .field("id", &self.shared.id)
            .field("scope", &self.shared.scope)
            .field("closed", &self.is_closed())
            .finish()
    }
}

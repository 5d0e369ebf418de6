//! Consumer-visible projection state.

use std::sync::Arc;

/// The reactive triple a projection exposes: data, loading flag and error.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionState<T> {
    /// Latest ordered records; `None` until the first snapshot arrives.
    pub data: Option<Arc<Vec<T>>>,

    /// True from activation until the first snapshot or failure.
    pub is_loading: bool,

    /// Last failure message; empty when there is none.
    pub error: String,
}

impl<T> Default for ProjectionState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: String::new(),
        }
    }
}

impl<T> ProjectionState<T> {
    /// State right after a subscription is opened.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Default::default()
        }
    }

    /// Records of the latest snapshot, empty before the first one.
    pub fn records(&self) -> &[T] {
        self.data.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Replace the data with a new ordered sequence.
    pub(crate) fn apply_snapshot(&mut self, data: Vec<T>) {
        self.data = Some(Arc::new(data));
        self.is_loading = false;
    }

    /// Record a failure; data stays at its last known value.
    pub(crate) fn apply_failure(&mut self, message: String) {
        self.error = message;
        self.is_loading = false;
    }
}

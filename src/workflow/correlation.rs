use crate::channel::CorrelationId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Process-wide monotonic source of correlation ids. Clones share the
/// counter, so ids never repeat across workflows.
#[derive(Debug, Clone, Default)]
pub struct CorrelationSequence {
    last: Arc<AtomicU64>,
}

impl CorrelationSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id, starting at 1
    pub fn next(&self) -> CorrelationId {
        CorrelationId::new(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// The one outstanding request a workflow is waiting on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingRequest {
    current: Option<CorrelationId>,
}

impl PendingRequest {
    /// Start waiting on `id`, superseding anything earlier
    pub fn begin(&mut self, id: CorrelationId) {
        if let Some(previous) = self.current.replace(id) {
            debug!("Request {} superseded by {}", previous, id);
        }
    }

    /// Whether a response tagged `incoming` answers the pending request.
    /// Untagged responses are taken as answering whatever is pending.
    pub fn accepts(&self, incoming: Option<CorrelationId>) -> bool {
        match (self.current, incoming) {
            (Some(current), Some(id)) => current == id,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn settle(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<CorrelationId> {
        self.current
    }

    pub fn is_pending(&self) -> bool {
        self.current.is_some()
    }
}

//! Application state for the monitor

use std::sync::Arc;

use canmon_core::{DiagnosticSequencer, FilterPolicy, MessageStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    store: Arc<MessageStore>,
    /// `None` when the sequencer runs free on its own task
    sequencer: Option<Arc<DiagnosticSequencer>>,
    policy: FilterPolicy,
}

impl AppState {
    pub fn new(
        store: Arc<MessageStore>,
        sequencer: Option<Arc<DiagnosticSequencer>>,
        policy: FilterPolicy,
    ) -> Self {
        Self {
            store,
            sequencer,
            policy,
        }
    }

    /// Read-only access to the history
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn sequencer(&self) -> Option<&Arc<DiagnosticSequencer>> {
        self.sequencer.as_ref()
    }

    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }
}

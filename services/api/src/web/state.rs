//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use learning_log_core::ports::RecordStore;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The store is the only shared mutable resource; requests are handled
/// independently with no in-process coordination between them.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

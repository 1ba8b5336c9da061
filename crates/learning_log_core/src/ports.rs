//! crates/learning_log_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{LearningRecord, RecordFields};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A concurrent writer won the race for a unique key. Expected under
    /// contention; callers recover by re-reading, never by surfacing this.
    #[error("Unique constraint violated")]
    UniqueViolation,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Port (Trait)
//=========================================================================================

/// The durable record store, keyed by `(user_id, idempotency_key)`.
///
/// Uniqueness of that composite key is enforced by the store itself (a unique
/// index, conditional write, or equivalent), never by in-process locking:
/// multiple process instances may run against the same store concurrently.
/// Any implementation must guarantee that at most one record persists per
/// key and that concurrent creators converge on the same final record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Atomically create a record for the key unless one already exists.
    ///
    /// Returns the persisted record plus `true` when this call created it,
    /// or the pre-existing record plus `false`. A store that cannot express
    /// the get-or-create atomically may instead surface
    /// [`PortError::UniqueViolation`] when it loses a race; callers then
    /// fall back to [`RecordStore::get`].
    async fn create_if_absent(
        &self,
        user_id: &str,
        idempotency_key: &str,
        fields: RecordFields,
    ) -> PortResult<(LearningRecord, bool)>;

    /// Fetch the record for the key, or `PortError::NotFound`.
    async fn get(&self, user_id: &str, idempotency_key: &str) -> PortResult<LearningRecord>;

    /// All of a user's records with `end_at` in the half-open range
    /// `[from, to)`, in ascending `end_at` order. Records without an
    /// `end_at` are never returned.
    async fn query_by_user_end_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<Vec<LearningRecord>>;
}

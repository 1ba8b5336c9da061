//! crates/learning_log_core/src/write.rs
//!
//! The idempotent write coordinator: validates a submission, applies the
//! default-fill rule, and performs an atomic get-or-create against the
//! record store keyed by `(user_id, idempotency_key)`.
//!
//! Two concurrent submissions with the same key can both pass any
//! pre-check before either commits, so the store's uniqueness constraint
//! is the real source of truth. When the store reports a uniqueness
//! violation the coordinator re-reads the winner and re-compares payloads
//! instead of surfacing a storage error.

use chrono::{DateTime, Utc};

use crate::domain::{LearningRecord, RecordFields, MAX_IDEMPOTENCY_KEY_LEN};
use crate::ports::{PortError, RecordStore};

/// A record submission as received from the caller, before default fill.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub user_id: String,
    pub idempotency_key: String,
    pub word_count: i64,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

/// How a submission resolved. Both variants carry the persisted record;
/// the distinction drives the 201-vs-200 response split at the boundary.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    /// A fresh record was persisted.
    Created(LearningRecord),
    /// The key was already used with an identical payload; the existing
    /// record is returned untouched.
    Replayed(LearningRecord),
}

impl WriteOutcome {
    pub fn record(&self) -> &LearningRecord {
        match self {
            WriteOutcome::Created(record) | WriteOutcome::Replayed(record) => record,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The submission was malformed; nothing was written.
    #[error("{0}")]
    Validation(String),
    /// The idempotency key was reused with a different payload; the
    /// original record is left untouched.
    #[error("Idempotency-Key reused with different payload.")]
    Conflict,
    #[error(transparent)]
    Port(#[from] PortError),
}

fn validate(input: &NewRecord) -> Result<(), WriteError> {
    if input.user_id.is_empty() {
        return Err(WriteError::Validation("user_id is required.".to_string()));
    }
    if input.idempotency_key.is_empty() {
        return Err(WriteError::Validation(
            "Idempotency-Key (header or body) is required.".to_string(),
        ));
    }
    if input.idempotency_key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(WriteError::Validation(format!(
            "idempotency_key must be at most {} characters.",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    if input.word_count < 0 {
        return Err(WriteError::Validation(
            "word_count must be >= 0.".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (input.start_at, input.end_at) {
        if start > end {
            return Err(WriteError::Validation(
                "start_at must be <= end_at.".to_string(),
            ));
        }
    }
    Ok(())
}

/// Submit a record, enforcing at-most-one logical record per
/// `(user_id, idempotency_key)`.
///
/// Validation happens before any storage access. When both timestamps are
/// absent the submission is recorded as a point-in-time event ending `now`
/// rather than being rejected. The get-or-create resolves a replay with an
/// identical payload to [`WriteOutcome::Replayed`] and a payload change to
/// [`WriteError::Conflict`], including under a lost creation race.
pub async fn submit_record(
    store: &dyn RecordStore,
    input: NewRecord,
    now: DateTime<Utc>,
) -> Result<WriteOutcome, WriteError> {
    validate(&input)?;

    let end_at = match (input.start_at, input.end_at) {
        // Default fill: a bare submission is a zero-duration event at `now`.
        (None, None) => Some(now),
        (_, end_at) => end_at,
    };
    let fields = RecordFields {
        word_count: input.word_count,
        start_at: input.start_at,
        end_at,
    };

    match store
        .create_if_absent(&input.user_id, &input.idempotency_key, fields.clone())
        .await
    {
        Ok((record, true)) => Ok(WriteOutcome::Created(record)),
        Ok((record, false)) => replay_or_conflict(record, &fields),
        Err(PortError::UniqueViolation) => {
            // Lost the creation race: the winner's record is authoritative.
            let record = store.get(&input.user_id, &input.idempotency_key).await?;
            replay_or_conflict(record, &fields)
        }
        Err(e) => Err(e.into()),
    }
}

fn replay_or_conflict(
    record: LearningRecord,
    fields: &RecordFields,
) -> Result<WriteOutcome, WriteError> {
    if record.matches_payload(fields) {
        Ok(WriteOutcome::Replayed(record))
    } else {
        Err(WriteError::Conflict)
    }
}

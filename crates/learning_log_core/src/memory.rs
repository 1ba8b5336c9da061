//! crates/learning_log_core/src/memory.rs
//!
//! An in-memory `RecordStore` backed by a mutex-guarded map. The mutex
//! plays the role of the store's own atomic constraint enforcement, so the
//! port contract (at most one record per key, concurrent creators converge)
//! holds without any database. Used by the test suites and as a reference
//! implementation of the port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{LearningRecord, RecordFields};
use crate::ports::{PortError, PortResult, RecordStore};

type Key = (String, String);

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<Key, LearningRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, HashMap<Key, LearningRecord>>> {
        self.records
            .lock()
            .map_err(|_| PortError::Unexpected("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_if_absent(
        &self,
        user_id: &str,
        idempotency_key: &str,
        fields: RecordFields,
    ) -> PortResult<(LearningRecord, bool)> {
        let mut records = self.lock()?;
        let key = (user_id.to_string(), idempotency_key.to_string());
        if let Some(existing) = records.get(&key) {
            return Ok((existing.clone(), false));
        }
        let record = LearningRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            idempotency_key: idempotency_key.to_string(),
            word_count: fields.word_count,
            start_at: fields.start_at,
            end_at: fields.end_at,
            created_at: Utc::now(),
        };
        records.insert(key, record.clone());
        Ok((record, true))
    }

    async fn get(&self, user_id: &str, idempotency_key: &str) -> PortResult<LearningRecord> {
        let records = self.lock()?;
        records
            .get(&(user_id.to_string(), idempotency_key.to_string()))
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Record {}/{} not found", user_id, idempotency_key))
            })
    }

    async fn query_by_user_end_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<Vec<LearningRecord>> {
        let records = self.lock()?;
        let mut matching: Vec<LearningRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| matches!(r.end_at, Some(end) if end >= from && end < to))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.end_at);
        Ok(matching)
    }
}

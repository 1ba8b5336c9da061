//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! The composite unique constraint on `(user_id, idempotency_key)` is the
//! authority for idempotent creates. `create_if_absent` rides on
//! `ON CONFLICT DO NOTHING`; a raw unique-index error (`23505`) surfacing
//! from any other path maps to `PortError::UniqueViolation` so the core's
//! race recovery can take over.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learning_log_core::domain::{LearningRecord, RecordFields};
use learning_log_core::ports::{PortError, PortResult, RecordStore};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const RECORD_COLUMNS: &str =
    "id, user_id, idempotency_key, word_count, start_at, end_at, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct RecordRow {
    id: Uuid,
    user_id: String,
    idempotency_key: String,
    word_count: i64,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl RecordRow {
    fn to_domain(self) -> LearningRecord {
        LearningRecord {
            id: self.id,
            user_id: self.user_id,
            idempotency_key: self.idempotency_key,
            word_count: self.word_count,
            start_at: self.start_at,
            end_at: self.end_at,
            created_at: self.created_at,
        }
    }
}

fn map_db_err(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return PortError::UniqueViolation;
        }
    }
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for DbAdapter {
    async fn create_if_absent(
        &self,
        user_id: &str,
        idempotency_key: &str,
        fields: RecordFields,
    ) -> PortResult<(LearningRecord, bool)> {
        let sql = format!(
            "INSERT INTO learning_records (id, user_id, idempotency_key, word_count, start_at, end_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, idempotency_key) DO NOTHING \
             RETURNING {RECORD_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(idempotency_key)
            .bind(fields.word_count)
            .bind(fields.start_at)
            .bind(fields.end_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        match inserted {
            Some(row) => Ok((row.to_domain(), true)),
            // DO NOTHING returned no row: another writer holds the key.
            None => Ok((self.get(user_id, idempotency_key).await?, false)),
        }
    }

    async fn get(&self, user_id: &str, idempotency_key: &str) -> PortResult<LearningRecord> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM learning_records \
             WHERE user_id = $1 AND idempotency_key = $2"
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(user_id)
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(RecordRow::to_domain).ok_or_else(|| {
            PortError::NotFound(format!("Record {}/{} not found", user_id, idempotency_key))
        })
    }

    async fn query_by_user_end_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<Vec<LearningRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM learning_records \
             WHERE user_id = $1 AND end_at >= $2 AND end_at < $3 \
             ORDER BY end_at ASC"
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(rows.into_iter().map(RecordRow::to_domain).collect())
    }
}

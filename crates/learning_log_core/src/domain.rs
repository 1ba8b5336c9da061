//! crates/learning_log_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum length accepted for an idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 64;

/// A single persisted learning session.
///
/// `id` and `created_at` are assigned by storage on creation and never
/// change afterwards. Records are write-once: the core never updates or
/// deletes them.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Unique per user, together with `user_id`.
    pub idempotency_key: String,
    pub word_count: i64,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied payload of a record, as handed to the store on
/// create. Also the unit of comparison when an idempotency key is replayed:
/// two payloads are the same when every field matches, with absent
/// timestamps comparing equal to absent timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    pub word_count: i64,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl LearningRecord {
    /// Whether this record was created from the given payload.
    pub fn matches_payload(&self, fields: &RecordFields) -> bool {
        self.word_count == fields.word_count
            && self.start_at == fields.start_at
            && self.end_at == fields.end_at
    }
}

/// Bucket width used when aggregating records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = InvalidGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            _ => Err(InvalidGranularity),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("granularity must be hour|day|month")]
pub struct InvalidGranularity;

/// Derived duration echoed back to the caller of a write: whole minutes
/// between `start_at` and `end_at`, 0 when either end is missing.
///
/// This is the point-in-time view of a record; the same-local-day rule
/// only applies during bucketed aggregation, not here.
pub fn study_minutes(start_at: Option<DateTime<Utc>>, end_at: Option<DateTime<Utc>>) -> i64 {
    match (start_at, end_at) {
        (Some(start), Some(end)) => (end - start).num_seconds().max(0) / 60,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn study_minutes_floors_to_whole_minutes() {
        let start = utc(2025, 10, 27, 10, 0, 0);
        assert_eq!(study_minutes(Some(start), Some(utc(2025, 10, 27, 10, 45, 0))), 45);
        assert_eq!(study_minutes(Some(start), Some(utc(2025, 10, 27, 10, 45, 59))), 45);
        assert_eq!(study_minutes(Some(start), Some(utc(2025, 10, 27, 10, 0, 30))), 0);
    }

    #[test]
    fn study_minutes_zero_when_either_end_missing() {
        let t = utc(2025, 10, 27, 10, 0, 0);
        assert_eq!(study_minutes(None, Some(t)), 0);
        assert_eq!(study_minutes(Some(t), None), 0);
        assert_eq!(study_minutes(None, None), 0);
    }

    #[test]
    fn payload_comparison_treats_both_absent_as_equal() {
        let record = LearningRecord {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            idempotency_key: "k1".to_string(),
            word_count: 10,
            start_at: None,
            end_at: Some(utc(2025, 10, 27, 10, 0, 0)),
            created_at: utc(2025, 10, 27, 10, 0, 0),
        };
        let same = RecordFields {
            word_count: 10,
            start_at: None,
            end_at: Some(utc(2025, 10, 27, 10, 0, 0)),
        };
        let different = RecordFields {
            word_count: 11,
            ..same.clone()
        };
        assert!(record.matches_payload(&same));
        assert!(!record.matches_payload(&different));
    }

    #[test]
    fn granularity_round_trips_through_strings() {
        for name in ["hour", "day", "month"] {
            let g: Granularity = name.parse().unwrap();
            assert_eq!(g.as_str(), name);
        }
        assert!("week".parse::<Granularity>().is_err());
        assert!("Day".parse::<Granularity>().is_err());
    }
}

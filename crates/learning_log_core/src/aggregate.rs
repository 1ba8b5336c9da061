//! crates/learning_log_core/src/aggregate.rs
//!
//! Folds a user's records into per-bucket sums and reduces them to totals
//! and per-bucket averages. `summarize` is a pure function of its inputs
//! with no cross-call state, so summaries are recomputed fresh on every
//! request and can never go stale.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::bucketing::{bucket_key_for_end, bucket_starts, bucketed_minutes};
use crate::domain::{Granularity, LearningRecord};
use crate::ports::{PortResult, RecordStore};

/// One summary request: a half-open UTC window, viewed at a granularity in
/// an IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct SummaryQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub granularity: Granularity,
    pub tz: Tz,
    /// Denominator policy for the averages: `true` divides by every bucket
    /// in the window (engagement density over the whole calendar range),
    /// `false` divides by only the buckets with activity (typical intensity
    /// per session-bearing bucket).
    pub include_empty: bool,
}

/// Word-count and study-minute sums, used for both totals and averages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryValues {
    pub word_count: f64,
    pub study_minutes: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub totals: SummaryValues,
    pub averages_per_bucket: SummaryValues,
}

/// Aggregate records over the query window.
///
/// Every record maps to the bucket holding the local floor of its `end_at`;
/// records without an `end_at` contribute nothing, and a record whose
/// bucket key falls outside the enumerated window is dropped rather than
/// an error (the caller is expected to pre-filter by range). The averages
/// denominator is floored at 1 so a zero-bucket window yields 0, never a
/// division by zero.
pub fn summarize(records: &[LearningRecord], query: &SummaryQuery) -> Summary {
    let starts = bucket_starts(query.from, query.to, query.granularity, query.tz);
    let index: HashMap<DateTime<Utc>, usize> = starts
        .iter()
        .enumerate()
        .map(|(i, start)| (start.with_timezone(&Utc), i))
        .collect();
    let mut buckets = vec![SummaryValues::default(); starts.len()];

    for record in records {
        let end_at = match record.end_at {
            Some(end_at) => end_at,
            None => continue,
        };
        let key = bucket_key_for_end(end_at, query.granularity, query.tz).with_timezone(&Utc);
        let bucket = match index.get(&key) {
            Some(&i) => &mut buckets[i],
            None => continue,
        };
        bucket.word_count += record.word_count.max(0) as f64;
        bucket.study_minutes += bucketed_minutes(record.start_at, end_at, query.tz);
    }

    let totals = buckets.iter().fold(SummaryValues::default(), |acc, b| {
        SummaryValues {
            word_count: acc.word_count + b.word_count,
            study_minutes: acc.study_minutes + b.study_minutes,
        }
    });

    let denominator = if query.include_empty {
        buckets.len().max(1)
    } else {
        buckets
            .iter()
            .filter(|b| b.word_count > 0.0 || b.study_minutes > 0.0)
            .count()
            .max(1)
    } as f64;

    Summary {
        totals,
        averages_per_bucket: SummaryValues {
            word_count: totals.word_count / denominator,
            study_minutes: totals.study_minutes / denominator,
        },
    }
}

/// Fetch a user's records for the window and summarize them.
///
/// An empty or inverted window short-circuits to an all-zero summary
/// without touching the store.
pub async fn summarize_user(
    store: &dyn RecordStore,
    user_id: &str,
    query: &SummaryQuery,
) -> PortResult<Summary> {
    if query.from >= query.to {
        return Ok(Summary::default());
    }
    let records = store
        .query_by_user_end_range(user_id, query.from, query.to)
        .await?;
    Ok(summarize(&records, query))
}

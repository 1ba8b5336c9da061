//! crates/learning_log_core/src/bucketing.rs
//!
//! The time-bucketing engine: pure calendar arithmetic over `chrono` and
//! `chrono-tz`. Buckets are identified by their local start instant in the
//! caller's IANA timezone, and all stepping happens in local wall-clock
//! terms so that days shortened or stretched by DST (23h/25h) bucket
//! correctly. A naive "add 24 hours" would silently misbucket around
//! transitions.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::domain::Granularity;

/// Resolve a local wall-clock time to an instant in `tz`.
///
/// A time repeated by a DST fall-back resolves to the earlier offset. A
/// time erased by a spring-forward gap resolves by probing forward in
/// 15-minute steps until the wall clock exists again (gaps are at most a
/// couple of hours in every IANA zone).
fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let mut probe = naive;
            loop {
                probe = probe + Duration::minutes(15);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt;
                }
            }
        }
    }
}

/// Floor an instant to the start of its bucket at the given granularity,
/// viewed in the local timezone.
pub fn floor_local(instant: DateTime<Utc>, granularity: Granularity, tz: Tz) -> DateTime<Tz> {
    let local = instant.with_timezone(&tz);
    let date = local.date_naive();
    let naive = match granularity {
        Granularity::Hour => date.and_hms_opt(local.hour(), 0, 0).unwrap(),
        Granularity::Day => date.and_hms_opt(0, 0, 0).unwrap(),
        Granularity::Month => date.with_day(1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
    };
    resolve_local(naive, tz)
}

/// Advance a bucket start to the next bucket start.
///
/// Hours step one absolute hour; days step to the next local date's
/// midnight (so DST days keep their real length); months step to the first
/// of the next month, rolling the year at December.
pub fn step_local(cur: DateTime<Tz>, granularity: Granularity, tz: Tz) -> DateTime<Tz> {
    match granularity {
        Granularity::Hour => cur + Duration::hours(1),
        Granularity::Day => {
            let next = cur.date_naive().succ_opt().unwrap();
            resolve_local(next.and_hms_opt(0, 0, 0).unwrap(), tz)
        }
        Granularity::Month => {
            let (year, month) = if cur.month() == 12 {
                (cur.year() + 1, 1)
            } else {
                (cur.year(), cur.month() + 1)
            };
            let first = chrono::NaiveDate::from_ymd_opt(year, month, 1).unwrap();
            resolve_local(first.and_hms_opt(0, 0, 0).unwrap(), tz)
        }
    }
}

/// Enumerate the local bucket starts covering the half-open range
/// `[from, to)`. This is the fixed universe of buckets for one query and
/// includes empty buckets; an inverted or empty range yields no buckets.
pub fn bucket_starts(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    granularity: Granularity,
    tz: Tz,
) -> Vec<DateTime<Tz>> {
    if from >= to {
        return Vec::new();
    }
    let end = floor_local(to, granularity, tz); // exclusive upper bound
    let mut cur = floor_local(from, granularity, tz);
    let mut out = Vec::new();
    while cur < end {
        out.push(cur);
        cur = step_local(cur, granularity, tz);
    }
    out
}

/// The bucket a record belongs to: the local floor of its `end_at`.
pub fn bucket_key_for_end(
    end_at: DateTime<Utc>,
    granularity: Granularity,
    tz: Tz,
) -> DateTime<Tz> {
    floor_local(end_at, granularity, tz)
}

/// Whether two instants fall on the same local calendar day.
pub fn same_local_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: Tz) -> bool {
    a.with_timezone(&tz).date_naive() == b.with_timezone(&tz).date_naive()
}

/// Minutes a record contributes to its bucket: whole minutes between start
/// and end, but only when the start is known and both ends share a local
/// calendar day. An overnight session still counts its words, just not its
/// duration.
pub fn bucketed_minutes(
    start_at: Option<DateTime<Utc>>,
    end_at: DateTime<Utc>,
    tz: Tz,
) -> f64 {
    match start_at {
        Some(start) if same_local_day(start, end_at, tz) => {
            let seconds = (end_at - start).num_seconds().max(0);
            (seconds / 60) as f64
        }
        _ => 0.0,
    }
}

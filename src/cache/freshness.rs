//! Freshness Module
//!
//! Read-time TTL evaluation shared by every driver, plus the injectable clock
//! drivers use to read "now".

use std::sync::Arc;

use chrono::{DateTime, Utc};

// == Clock ==
/// Source of the current time. Drivers hold one so tests can move time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Returns the wall clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Returns a clock shifted by `offset_secs` from the wall clock.
///
/// Meant for tests: hand it to a driver's `with_clock` to read entries as if
/// that much time had passed since they were written. Serving code uses
/// [`system_clock`].
pub fn offset_clock(offset_secs: i64) -> Clock {
    Arc::new(move || Utc::now() + chrono::Duration::seconds(offset_secs))
}

// == TTL ==
/// Normalizes a caller TTL: `None` and `Some(0)` both mean "accept any age".
pub fn effective_ttl(ttl: Option<u64>) -> Option<u64> {
    ttl.filter(|ttl| *ttl > 0)
}

// == Is Fresh ==
/// Checks whether an entry created at `created_at` may still be served.
///
/// Boundary condition: an entry is stale only once `created_at + ttl < now`,
/// compared in whole Unix seconds. An unknown creation time is stale.
pub fn is_fresh(created_at: Option<DateTime<Utc>>, ttl: u64, now: DateTime<Utc>) -> bool {
    match created_at {
        Some(created_at) => {
            let ttl = i64::try_from(ttl).unwrap_or(i64::MAX);
            created_at.timestamp().saturating_add(ttl) >= now.timestamp()
        }
        None => false,
    }
}

/// Seconds elapsed between creation and `now`, for log output.
pub fn age_secs(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.timestamp() - created_at.timestamp()
}

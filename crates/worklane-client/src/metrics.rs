//! Metrics emitted by the client
//!
//! Counters and histograms go through the `metrics` facade. The embedding
//! application decides whether to install a recorder; without one every
//! call here is a no-op.

use metrics::{counter, histogram};

/// Record a finished request with its outcome class.
pub fn record_request(method: &str, outcome: &str, duration_secs: f64) {
    counter!(
        "client_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "client_request_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// Record a settled refresh episode.
pub fn record_refresh(outcome: &str) {
    counter!("auth_refresh_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record how many queued requests a refresh episode released.
pub fn record_waiters_drained(count: usize) {
    counter!("auth_refresh_waiters_drained_total").increment(count as u64);
}

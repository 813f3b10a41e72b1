// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder can collect these.
//! Without a recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all database metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("tempo_db_reads_total", "Read usages handed out");
    describe_counter!("tempo_db_writes_total", "Write usages handed out");
    describe_counter!("tempo_db_commits_total", "Write groups committed");
    describe_counter!("tempo_db_rollbacks_total", "Write groups rolled back");
    describe_counter!(
        "tempo_db_contexts_created_total",
        "Database contexts opened"
    );
    describe_counter!("tempo_db_recycles_total", "Context pool recycles");
    describe_gauge!("tempo_db_pending_writes", "Write usages not yet completed");
    describe_gauge!("tempo_db_active_usages", "Context usages currently held");
    describe_histogram!(
        "tempo_db_drain_seconds",
        "Time spent draining usages for a blocking section"
    );
}

pub fn record_read() {
    metrics::counter!("tempo_db_reads_total").increment(1);
}

pub fn record_write() {
    metrics::counter!("tempo_db_writes_total").increment(1);
}

pub fn record_commit() {
    metrics::counter!("tempo_db_commits_total").increment(1);
}

pub fn record_rollback() {
    metrics::counter!("tempo_db_rollbacks_total").increment(1);
}

pub fn record_context_created() {
    metrics::counter!("tempo_db_contexts_created_total").increment(1);
}

pub fn record_recycle() {
    metrics::counter!("tempo_db_recycles_total").increment(1);
}

/// Set the number of write usages that have not completed.
pub fn set_pending_writes(count: u64) {
    metrics::gauge!("tempo_db_pending_writes").set(count as f64);
}

/// Set the number of context usages currently held across all threads.
pub fn set_active_usages(count: u64) {
    metrics::gauge!("tempo_db_active_usages").set(count as f64);
}

/// Record how long a blocking section waited for outstanding usages.
pub fn record_drain(seconds: f64) {
    metrics::histogram!("tempo_db_drain_seconds").record(seconds);
}

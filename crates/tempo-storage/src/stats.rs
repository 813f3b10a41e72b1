// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database usage counters.
//!
//! A [`DatabaseStats`] is injected into the context factory rather than kept
//! in process-global state, so tests and embedders can each observe their own
//! instance. Every update is also mirrored into the `metrics` facade through
//! the helpers in [`recording`].

pub mod recording;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters for one context factory.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    writes: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    contexts_created: AtomicU64,
    recycles: AtomicU64,
    pending_writes: AtomicU64,
    active_usages: AtomicU64,
}

/// Point-in-time copy of [`DatabaseStats`], printable by `tempo-db status --json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub commits: u64,
    pub rollbacks: u64,
    pub contexts_created: u64,
    pub recycles: u64,
    pub pending_writes: u64,
    pub active_usages: u64,
}

impl DatabaseStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        recording::record_read();
    }

    /// A write usage was requested; it stays pending until it completes.
    pub(crate) fn record_write_started(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending_writes.fetch_add(1, Ordering::Relaxed) + 1;
        recording::record_write();
        recording::set_pending_writes(pending);
    }

    pub(crate) fn record_write_finished(&self) {
        let pending = decrement(&self.pending_writes);
        recording::set_pending_writes(pending);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        recording::record_commit();
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        recording::record_rollback();
    }

    pub(crate) fn record_context_created(&self) {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);
        recording::record_context_created();
    }

    pub(crate) fn record_recycle(&self) {
        self.recycles.fetch_add(1, Ordering::Relaxed);
        recording::record_recycle();
    }

    pub(crate) fn set_active_usages(&self, count: usize) {
        let count = count as u64;
        self.active_usages.store(count, Ordering::Relaxed);
        recording::set_active_usages(count);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            contexts_created: self.contexts_created.load(Ordering::Relaxed),
            recycles: self.recycles.load(Ordering::Relaxed),
            pending_writes: self.pending_writes.load(Ordering::Relaxed),
            active_usages: self.active_usages.load(Ordering::Relaxed),
        }
    }
}

fn decrement(counter: &AtomicU64) -> u64 {
    let previous = counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_sub(1))
        })
        .unwrap_or_default();
    previous.saturating_sub(1)
}

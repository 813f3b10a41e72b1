// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write usages and the transaction coordinator.
//!
//! All writes in the process go through one reentrant gate. The first
//! [`WriteUsage`] on a thread takes the gate (and usually begins a
//! transaction); further usages on the same thread nest inside that group.
//! When the last usage of the group completes, the group commits, or rolls
//! back if any usage failed or asked for it, and the context pool is recycled
//! so every thread sees the result.
//!
//! Side effects outside the database (blob files) are queued with
//! [`WriteUsage::after_commit`] and only run once the group has committed.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use rusqlite::{Connection, Params};
use tracing::{debug, error, warn};

use tempo_core::TempoError;

use crate::context::Context;
use crate::pool::{ContextPool, Lease};
use crate::stats::DatabaseStats;

/// How a write group ended, as seen by the usage that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    /// The group's transaction was committed.
    Committed,
    /// The group was rolled back because a usage failed or requested it.
    RolledBack,
    /// An enclosing usage of the same group is still open.
    Pending,
}

pub(crate) struct WriteCoordinator {
    pool: Arc<ContextPool>,
    stats: Arc<DatabaseStats>,
    state: Mutex<WriterState>,
    gate_released: Condvar,
}

type CommitAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct WriterState {
    owner: Option<ThreadId>,
    usages: usize,
    transaction: Option<Arc<Context>>,
    did_write: bool,
    did_error: bool,
    after_commit: Vec<CommitAction>,
}

/// What a single usage contributes to its group on completion.
#[derive(Debug, Clone, Copy, Default)]
struct UsageFlags {
    performed_write: bool,
    errored: bool,
}

impl WriteCoordinator {
    pub fn new(pool: Arc<ContextPool>, stats: Arc<DatabaseStats>) -> Self {
        Self {
            pool,
            stats,
            state: Mutex::new(WriterState::default()),
            gate_released: Condvar::new(),
        }
    }

    /// Join or start the calling thread's write group.
    ///
    /// The lease must already be checked out; checking out while holding the
    /// gate could wait on a blocking section that is itself waiting on us.
    pub fn begin(
        self: &Arc<Self>,
        lease: Lease,
        with_transaction: bool,
    ) -> Result<WriteUsage, TempoError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while state.owner.is_some_and(|owner| owner != me) {
            self.gate_released.wait(&mut state);
        }
        state.owner = Some(me);

        let mut began_transaction = false;
        if with_transaction && state.transaction.is_none() {
            if let Err(err) = lease.context().begin() {
                if state.usages == 0 {
                    state.owner = None;
                    drop(state);
                    self.gate_released.notify_all();
                }
                self.stats.record_write_finished();
                return Err(err);
            }
            state.transaction = Some(lease.shared_context());
            began_transaction = true;
        }

        state.usages += 1;
        debug!(
            depth = state.usages,
            context = lease.context().id(),
            began_transaction,
            "write usage started"
        );
        Ok(WriteUsage {
            lease,
            coordinator: Arc::clone(self),
            performed_write: false,
            errors: Vec::new(),
            rollback_requested: false,
            is_transaction_leader: began_transaction,
            completed: false,
        })
    }

    /// Run `f` while holding the write gate exclusively.
    ///
    /// With `reentrant` unset, calling this from inside a write group on the
    /// same thread fails instead of running under the open transaction.
    pub fn exclusive<T>(
        &self,
        reentrant: bool,
        f: impl FnOnce() -> Result<T, TempoError>,
    ) -> Result<T, TempoError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            if reentrant {
                return f();
            }
            return Err(TempoError::WouldDeadlock(
                "cannot run this operation inside a write usage on the same thread".into(),
            ));
        }
        while state.owner.is_some() {
            self.gate_released.wait(&mut state);
        }
        f()
    }

    fn usage_completed(&self, flags: UsageFlags) -> Result<GroupOutcome, TempoError> {
        let mut state = self.state.lock();
        state.usages = state.usages.saturating_sub(1);
        state.did_write |= flags.performed_write;
        state.did_error |= flags.errored;
        self.stats.record_write_finished();

        if state.usages > 0 {
            return Ok(GroupOutcome::Pending);
        }

        let errored = state.did_error;
        let result = match state.transaction.take() {
            Some(context) if errored => context.rollback().map(|()| GroupOutcome::RolledBack),
            Some(context) => match context.commit() {
                Ok(()) => Ok(GroupOutcome::Committed),
                Err(err) => {
                    if let Err(rollback_err) = context.rollback() {
                        warn!(error = %rollback_err, "rollback after failed commit also failed");
                    }
                    Err(err)
                }
            },
            None if errored => Ok(GroupOutcome::RolledBack),
            None => Ok(GroupOutcome::Committed),
        };

        match &result {
            Ok(GroupOutcome::Committed) => self.stats.record_commit(),
            _ => self.stats.record_rollback(),
        }

        if state.did_write || errored || result.is_err() {
            self.pool.recycle();
        }

        // Still under the gate: no other group can touch the same files yet.
        let actions = std::mem::take(&mut state.after_commit);
        if matches!(result, Ok(GroupOutcome::Committed)) {
            for action in actions {
                action();
            }
        } else if !actions.is_empty() {
            debug!(discarded = actions.len(), "dropping post-commit actions");
        }

        debug!(
            outcome = ?result.as_ref().ok(),
            wrote = state.did_write,
            errored,
            "write group completed"
        );

        state.did_write = false;
        state.did_error = false;
        state.owner = None;
        drop(state);
        self.gate_released.notify_all();
        result
    }
}

/// A write usage on the calling thread's context.
///
/// Dropping the usage completes it. Use [`WriteUsage::finish`] to observe the
/// group outcome, including commit failures.
pub struct WriteUsage {
    lease: Lease,
    coordinator: Arc<WriteCoordinator>,
    performed_write: bool,
    errors: Vec<String>,
    rollback_requested: bool,
    is_transaction_leader: bool,
    completed: bool,
}

impl WriteUsage {
    /// Run a mutating statement.
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> Result<usize, TempoError> {
        match self.lease.context().call(|conn| conn.execute(sql, params)) {
            Ok(changed) => {
                self.performed_write = true;
                Ok(changed)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Run a closure against the connection. Errors are recorded on the usage.
    ///
    /// Writes made here must be flagged with [`WriteUsage::mark_written`].
    pub fn call<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, TempoError> {
        let result = self.lease.context().call(f);
        result.map_err(|err| self.fail(err))
    }

    pub fn mark_written(&mut self) {
        self.performed_write = true;
    }

    /// Run `action` once the whole group has committed. It is dropped
    /// unrun when the group rolls back or fails to commit.
    ///
    /// The action runs while the write gate is held and must not use the
    /// database.
    pub fn after_commit(&mut self, action: impl FnOnce() + Send + 'static) {
        self.coordinator
            .state
            .lock()
            .after_commit
            .push(Box::new(action));
    }

    /// Record an application error; the whole group will roll back.
    pub fn record_error(&mut self, err: impl fmt::Display) {
        let message = err.to_string();
        warn!(error = %message, "error recorded on write usage");
        self.errors.push(message);
    }

    /// Ask for the whole group to be rolled back once it completes.
    pub fn rollback(&mut self) {
        self.rollback_requested = true;
    }

    pub fn performed_write(&self) -> bool {
        self.performed_write
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_transaction_leader(&self) -> bool {
        self.is_transaction_leader
    }

    pub fn context_id(&self) -> u64 {
        self.lease.context().id()
    }

    /// Complete the usage and report what happened to the group.
    pub fn finish(mut self) -> Result<GroupOutcome, TempoError> {
        self.complete()
    }

    fn fail(&mut self, err: rusqlite::Error) -> TempoError {
        self.record_error(&err);
        TempoError::storage(err)
    }

    fn complete(&mut self) -> Result<GroupOutcome, TempoError> {
        if self.completed {
            return Ok(GroupOutcome::Pending);
        }
        self.completed = true;
        let flags = UsageFlags {
            performed_write: self.performed_write,
            errored: self.rollback_requested || !self.errors.is_empty(),
        };
        self.coordinator.usage_completed(flags)
    }
}

impl Drop for WriteUsage {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if thread::panicking() {
            self.rollback_requested = true;
        }
        if let Err(err) = self.complete() {
            error!(error = %err, "write group failed to commit");
        }
    }
}

impl fmt::Debug for WriteUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteUsage")
            .field("context", &self.lease.context().id())
            .field("in_transaction", &self.lease.context().in_transaction())
            .field("performed_write", &self.performed_write)
            .field("errors", &self.errors)
            .field("rollback_requested", &self.rollback_requested)
            .field("is_transaction_leader", &self.is_transaction_leader)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    use tempo_config::StorageConfig;

    use super::*;
    use crate::context::ContextSettings;

    struct Harness {
        pool: Arc<ContextPool>,
        coordinator: Arc<WriteCoordinator>,
        stats: Arc<DatabaseStats>,
        _dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let stats = Arc::new(DatabaseStats::new());
            let pool = Arc::new(ContextPool::new(
                ContextSettings::from(&StorageConfig::in_dir(dir.path())),
                Arc::clone(&stats),
            ));
            let coordinator = Arc::new(WriteCoordinator::new(
                Arc::clone(&pool),
                Arc::clone(&stats),
            ));
            Self {
                pool,
                coordinator,
                stats,
                _dir: dir,
            }
        }

        fn write(&self) -> WriteUsage {
            self.stats.record_write_started();
            let lease = self.pool.checkout().unwrap();
            self.coordinator.begin(lease, true).unwrap()
        }

        fn file_count(&self) -> i64 {
            let lease = self.pool.checkout().unwrap();
            lease
                .context()
                .call(|conn| conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0)))
                .unwrap()
        }
    }

    fn insert_file(usage: &mut WriteUsage, hash: &str) {
        usage
            .execute("INSERT INTO files (hash) VALUES (?1)", [hash])
            .unwrap();
    }

    #[test]
    fn single_usage_commits() {
        let h = Harness::new();
        let mut usage = h.write();
        assert!(usage.is_transaction_leader());
        insert_file(&mut usage, "a");
        assert_eq!(usage.finish().unwrap(), GroupOutcome::Committed);

        assert_eq!(h.file_count(), 1);
        let snap = h.stats.snapshot();
        assert_eq!(snap.commits, 1);
        assert_eq!(snap.rollbacks, 0);
        assert_eq!(snap.pending_writes, 0);
    }

    #[test]
    fn nested_usages_share_one_transaction() {
        let h = Harness::new();
        let mut outer = h.write();
        let mut inner = h.write();
        assert!(outer.is_transaction_leader());
        assert!(!inner.is_transaction_leader());
        assert_eq!(outer.context_id(), inner.context_id());

        insert_file(&mut inner, "inner");
        assert_eq!(inner.finish().unwrap(), GroupOutcome::Pending);
        assert_eq!(h.stats.snapshot().commits, 0);

        insert_file(&mut outer, "outer");
        assert_eq!(outer.finish().unwrap(), GroupOutcome::Committed);
        assert_eq!(h.stats.snapshot().commits, 1);
        assert_eq!(h.file_count(), 2);
    }

    #[test]
    fn after_commit_runs_only_when_group_commits() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let h = Harness::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let mut outer = h.write();
        {
            let mut inner = h.write();
            let ran = Arc::clone(&ran);
            inner.after_commit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(inner.finish().unwrap(), GroupOutcome::Pending);
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(outer.finish().unwrap(), GroupOutcome::Committed);
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let mut rolled_back = h.write();
        let counter = Arc::clone(&ran);
        rolled_back.after_commit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        rolled_back.rollback();
        assert_eq!(rolled_back.finish().unwrap(), GroupOutcome::RolledBack);

        // Nothing carries over into the next group either.
        assert_eq!(h.write().finish().unwrap(), GroupOutcome::Committed);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    /// Queue a write whose deferred foreign key check fails at COMMIT.
    fn break_commit(usage: &mut WriteUsage) {
        usage
            .call(|conn| conn.execute_batch("PRAGMA defer_foreign_keys = ON;"))
            .unwrap();
        usage
            .execute(
                "INSERT INTO beatmaps (beatmap_set_id, difficulty_name, ruleset_id, md5_hash)
                 VALUES (404, 'Lost', 0, 'deadbeef')",
                [],
            )
            .unwrap();
    }

    #[test]
    fn failed_commit_rolls_back_and_releases_gate() {
        let h = Harness::new();
        let read = h.pool.checkout().unwrap();
        let mut usage = h.write();
        break_commit(&mut usage);

        let err = usage.finish().unwrap_err();
        assert!(err.is_storage());
        let snap = h.stats.snapshot();
        assert_eq!(snap.commits, 0);
        assert_eq!(snap.rollbacks, 1);
        assert_eq!(snap.pending_writes, 0);

        assert!(!read.context().in_transaction());
        let beatmaps: i64 = read
            .context()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM beatmaps", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(beatmaps, 0);
        drop(read);

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let pool = Arc::clone(&h.pool);
        let coordinator = Arc::clone(&h.coordinator);
        let stats = Arc::clone(&h.stats);
        let other = thread::spawn(move || {
            stats.record_write_started();
            let lease = pool.checkout().unwrap();
            let mut usage = coordinator.begin(lease, true).unwrap();
            insert_file(&mut usage, "after-failed-commit");
            done_tx.send(usage.finish().unwrap()).unwrap();
        });
        let outcome = done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(outcome, GroupOutcome::Committed);
        other.join().unwrap();
        assert_eq!(h.file_count(), 1);
    }

    #[test]
    #[traced_test]
    fn dropped_usage_logs_failed_commit() {
        let h = Harness::new();
        let mut usage = h.write();
        break_commit(&mut usage);
        drop(usage);

        assert!(logs_contain("write group failed to commit"));
        assert_eq!(h.stats.snapshot().rollbacks, 1);
        assert_eq!(h.write().finish().unwrap(), GroupOutcome::Committed);
    }

    #[test]
    fn inner_rollback_discards_whole_group() {
        let h = Harness::new();
        let mut outer = h.write();
        insert_file(&mut outer, "outer");
        {
            let mut inner = h.write();
            insert_file(&mut inner, "inner");
            inner.rollback();
        }
        assert_eq!(outer.finish().unwrap(), GroupOutcome::RolledBack);

        assert_eq!(h.file_count(), 0);
        let snap = h.stats.snapshot();
        assert_eq!(snap.rollbacks, 1);
        assert_eq!(snap.commits, 0);
    }

    #[test]
    fn failed_statement_rolls_back_group() {
        let h = Harness::new();
        let mut usage = h.write();
        insert_file(&mut usage, "dup");
        let err = usage
            .execute("INSERT INTO files (hash) VALUES (?1)", ["dup"])
            .unwrap_err();
        assert!(err.is_storage());
        assert_eq!(usage.errors().len(), 1);
        assert_eq!(usage.finish().unwrap(), GroupOutcome::RolledBack);
        assert_eq!(h.file_count(), 0);
    }

    #[test]
    fn drop_without_finish_completes_group() {
        let h = Harness::new();
        {
            let mut usage = h.write();
            insert_file(&mut usage, "dropped");
        }
        assert_eq!(h.file_count(), 1);
        assert_eq!(h.stats.snapshot().commits, 1);
        assert_eq!(h.stats.snapshot().pending_writes, 0);
    }

    #[test]
    fn group_that_wrote_recycles_pool() {
        let h = Harness::new();
        let before = h.pool.generation();
        let mut usage = h.write();
        insert_file(&mut usage, "x");
        usage.finish().unwrap();
        assert_eq!(h.pool.generation(), before + 1);

        let idle = h.write();
        idle.finish().unwrap();
        assert_eq!(h.pool.generation(), before + 1);
    }

    #[test]
    fn usage_without_transaction_still_counts_a_commit() {
        let h = Harness::new();
        h.stats.record_write_started();
        let lease = h.pool.checkout().unwrap();
        let usage = h.coordinator.begin(lease, false).unwrap();
        assert!(!usage.is_transaction_leader());
        assert_eq!(usage.finish().unwrap(), GroupOutcome::Committed);
        assert_eq!(h.stats.snapshot().commits, 1);
    }

    #[test]
    fn exclusive_refuses_reentry_unless_allowed() {
        let h = Harness::new();
        let usage = h.write();
        let refused = h.coordinator.exclusive(false, || Ok(()));
        assert!(matches!(refused, Err(TempoError::WouldDeadlock(_))));
        assert!(h.coordinator.exclusive(true, || Ok(())).is_ok());
        usage.finish().unwrap();
        assert!(h.coordinator.exclusive(false, || Ok(())).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// A group rolls back exactly when at least one usage asked for it.
        #[test]
        fn rollback_flag_is_or_reduced(flags in proptest::collection::vec(any::<bool>(), 1..6)) {
            let h = Harness::new();
            let mut usages: Vec<WriteUsage> = flags.iter().map(|_| h.write()).collect();
            for (i, (usage, &rollback)) in usages.iter_mut().zip(&flags).enumerate() {
                insert_file(usage, &format!("f{i}"));
                if rollback {
                    usage.rollback();
                }
            }
            let mut outcome = GroupOutcome::Pending;
            while let Some(usage) = usages.pop() {
                outcome = usage.finish().unwrap();
            }

            let expected = if flags.iter().any(|&f| f) {
                GroupOutcome::RolledBack
            } else {
                GroupOutcome::Committed
            };
            prop_assert_eq!(outcome, expected);
            let snap = h.stats.snapshot();
            prop_assert_eq!(snap.commits + snap.rollbacks, 1);
        }
    }
}

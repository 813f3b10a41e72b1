// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The context factory: the contract every store is written against.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use tempo_config::StorageConfig;
use tempo_core::{HealthStatus, TempoError};

use crate::context::ContextSettings;
use crate::migrations;
use crate::pool::{ContextPool, Lease, NotSend};
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::write::{WriteCoordinator, WriteUsage};

/// Hands out read and write usages of per-thread database contexts.
///
/// Cloning is cheap; all clones share one pool, one write gate and one set of
/// counters.
#[derive(Clone)]
pub struct ContextFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    config: StorageConfig,
    pool: Arc<ContextPool>,
    writer: Arc<WriteCoordinator>,
    stats: Arc<DatabaseStats>,
}

/// A read usage of the calling thread's context.
///
/// Reads nested inside a write usage on the same thread see that write's
/// uncommitted changes, since both use the same context.
pub struct ContextUsage {
    lease: Lease,
}

impl ContextUsage {
    /// Run a closure against the connection.
    pub fn call<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, TempoError> {
        self.lease.context().call(f).map_err(TempoError::storage)
    }

    pub fn context_id(&self) -> u64 {
        self.lease.context().id()
    }

    pub fn generation(&self) -> u64 {
        self.lease.context().generation()
    }
}

/// Guard returned by [`ContextFactory::block_all_operations`].
///
/// While it lives, other threads cannot obtain new usages. Dropping it lifts
/// the block.
#[must_use = "operations are unblocked as soon as the section is dropped"]
pub struct BlockingSection {
    pool: Arc<ContextPool>,
    _not_send: NotSend,
}

impl Drop for BlockingSection {
    fn drop(&mut self) {
        self.pool.unblock();
    }
}

impl ContextFactory {
    /// Open the database described by `config` with a fresh set of counters.
    pub fn open(config: StorageConfig) -> Result<Self, TempoError> {
        Self::with_stats(config, Arc::new(DatabaseStats::new()))
    }

    /// Open the database, recording activity into `stats`.
    ///
    /// The calling thread's context is opened immediately, so a missing
    /// directory, a corrupt file or a failed migration is reported here.
    pub fn with_stats(config: StorageConfig, stats: Arc<DatabaseStats>) -> Result<Self, TempoError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let pool = Arc::new(ContextPool::new(
            ContextSettings::from(&config),
            Arc::clone(&stats),
        ));
        let writer = Arc::new(WriteCoordinator::new(Arc::clone(&pool), Arc::clone(&stats)));
        let factory = Self {
            inner: Arc::new(FactoryInner {
                config,
                pool,
                writer,
                stats,
            }),
        };

        drop(factory.inner.pool.checkout()?);
        info!(
            path = %factory.database_path().display(),
            "database opened"
        );
        Ok(factory)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    pub fn database_path(&self) -> &Path {
        &self.inner.pool.settings().path
    }

    /// Root of the content-addressed blob store.
    pub fn files_dir(&self) -> PathBuf {
        self.inner.config.files_dir()
    }

    /// A read usage of the calling thread's context.
    pub fn get(&self) -> Result<ContextUsage, TempoError> {
        self.inner.stats.record_read();
        let lease = self.inner.pool.checkout()?;
        Ok(ContextUsage { lease })
    }

    /// A write usage that joins the calling thread's write group, starting one
    /// (and a transaction, when `with_transaction` is set) if none is open.
    pub fn get_for_write(&self, with_transaction: bool) -> Result<WriteUsage, TempoError> {
        self.inner.stats.record_write_started();
        let lease = match self.inner.pool.checkout() {
            Ok(lease) => lease,
            Err(err) => {
                self.inner.stats.record_write_finished();
                return Err(err);
            }
        };
        self.inner.writer.begin(lease, with_transaction)
    }

    /// Shorthand for `get_for_write(true)`.
    pub fn write(&self) -> Result<WriteUsage, TempoError> {
        self.get_for_write(true)
    }

    /// Close every thread's context so the next usage opens a fresh one.
    pub fn recycle(&self) -> Result<(), TempoError> {
        self.ensure_open()?;
        self.inner.writer.exclusive(true, || {
            self.inner.pool.recycle();
            Ok(())
        })
    }

    /// Delete the database file. The next usage creates an empty database.
    ///
    /// Usages held by other threads are drained first, so no context opened on
    /// the old file survives the reset. The write gate is taken only after the
    /// drain: a thread holding a usage may be queued on the gate.
    pub fn reset_database(&self) -> Result<(), TempoError> {
        self.ensure_open()?;
        if self.inner.pool.has_usage_on_current_thread() {
            return Err(TempoError::WouldDeadlock(
                "cannot reset the database while this thread holds a context usage".into(),
            ));
        }
        let _section = self.block_all_operations()?;
        self.inner.writer.exclusive(false, || {
            self.inner.pool.recycle();
            let path = self.database_path();
            for file in database_files(path) {
                match std::fs::remove_file(&file) {
                    Ok(()) => debug!(file = %file.display(), "removed database file"),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
            warn!(path = %path.display(), "database reset");
            Ok(())
        })
    }

    /// Block all database operations until the returned section is dropped.
    ///
    /// Waits until every outstanding usage on other threads is released.
    pub fn block_all_operations(&self) -> Result<BlockingSection, TempoError> {
        self.inner.pool.block()?;
        Ok(BlockingSection {
            pool: Arc::clone(&self.inner.pool),
            _not_send: PhantomData,
        })
    }

    pub fn health_check(&self) -> HealthStatus {
        if self.inner.pool.is_disposed() {
            return HealthStatus::Unhealthy("context factory has been closed".into());
        }
        if self.inner.pool.is_blocked() {
            return HealthStatus::Degraded("database operations are blocked".into());
        }
        let probe = self
            .get()
            .and_then(|usage| usage.call(|conn| conn.query_row("SELECT 1", [], |_| Ok(()))));
        match probe {
            Ok(()) => HealthStatus::Healthy,
            Err(err) => HealthStatus::Unhealthy(err.to_string()),
        }
    }

    /// Incremented every time the pool is recycled.
    pub fn generation(&self) -> u64 {
        self.inner.pool.generation()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Schema version recorded in the database file.
    pub fn schema_version(&self) -> Result<i64, TempoError> {
        let usage = self.get()?;
        let version = usage.call(|conn| Ok(migrations::applied_version(conn)))?;
        version
    }

    /// Drain all usages, checkpoint the WAL and refuse further use.
    pub fn close(&self) -> Result<(), TempoError> {
        let section = self.block_all_operations()?;
        {
            let usage = self.get()?;
            usage.call(|conn| {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })?;
        }
        self.inner.pool.dispose();
        drop(section);
        info!("database closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), TempoError> {
        if self.inner.pool.is_disposed() {
            return Err(TempoError::Disposed);
        }
        Ok(())
    }
}

/// The database file and its WAL side files.
fn database_files(path: &Path) -> [PathBuf; 3] {
    let with_suffix = |suffix: &str| {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    [path.to_path_buf(), with_suffix("-wal"), with_suffix("-shm")]
}

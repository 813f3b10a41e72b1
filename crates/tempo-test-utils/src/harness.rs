// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-directory database harness.
//!
//! `TestDatabase` owns a temporary data directory and a [`ContextFactory`]
//! opened on it. The directory is removed when the harness is dropped.

use std::sync::Arc;

use tempo_config::StorageConfig;
use tempo_core::TempoError;
use tempo_storage::{ContextFactory, DatabaseStats};

/// Builder for creating test databases with configurable options.
pub struct TestDatabaseBuilder {
    wal_mode: bool,
    busy_timeout_ms: u64,
    drain_poll_interval_ms: u64,
    database_name: String,
}

impl TestDatabaseBuilder {
    fn new() -> Self {
        Self {
            wal_mode: true,
            busy_timeout_ms: 5_000,
            drain_poll_interval_ms: 5,
            database_name: "client".to_string(),
        }
    }

    /// Toggle SQLite WAL mode.
    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Set how long a connection waits on a locked database file.
    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Set the drain poll interval used by blocking sections.
    pub fn with_drain_poll_interval_ms(mut self, ms: u64) -> Self {
        self.drain_poll_interval_ms = ms;
        self
    }

    /// Set the database file stem.
    pub fn with_database_name(mut self, name: &str) -> Self {
        self.database_name = name.to_string();
        self
    }

    /// Create the temp directory and open the factory on it.
    pub fn build(self) -> Result<TestDatabase, TempoError> {
        let temp_dir = tempfile::TempDir::new()?;
        let config = StorageConfig {
            wal_mode: self.wal_mode,
            busy_timeout_ms: self.busy_timeout_ms,
            drain_poll_interval_ms: self.drain_poll_interval_ms,
            database_name: self.database_name,
            ..StorageConfig::in_dir(temp_dir.path())
        };
        let stats = Arc::new(DatabaseStats::new());
        let factory = ContextFactory::with_stats(config.clone(), Arc::clone(&stats))?;

        Ok(TestDatabase {
            factory,
            stats,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A context factory over a throwaway data directory.
pub struct TestDatabase {
    /// The factory under test.
    pub factory: ContextFactory,
    /// Counters injected into the factory.
    pub stats: Arc<DatabaseStats>,
    /// Storage settings the factory was opened with.
    pub config: StorageConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestDatabase {
    /// Create a new builder for configuring the test database.
    pub fn builder() -> TestDatabaseBuilder {
        TestDatabaseBuilder::new()
    }

    /// A test database with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory or the database cannot be created.
    pub fn new() -> Self {
        Self::builder()
            .build()
            .expect("failed to create test database")
    }

    /// Row count of `table`, read through a fresh usage on the calling thread.
    pub fn count(&self, table: &str) -> Result<i64, TempoError> {
        let usage = self.factory.get()?;
        usage.call(|conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
        })
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

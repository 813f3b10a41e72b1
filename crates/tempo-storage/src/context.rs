// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single open database context.
//!
//! A context owns one `rusqlite::Connection`. Contexts are handed to exactly
//! one thread at a time by the pool; the reentrant lock around the connection
//! only exists so the pool can keep contexts in shared maps.

use std::path::PathBuf;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use rusqlite::Connection;
use tracing::debug;

use tempo_config::StorageConfig;
use tempo_core::TempoError;

use crate::migrations;

/// Connection settings shared by every context of one factory.
#[derive(Debug, Clone)]
pub(crate) struct ContextSettings {
    pub path: PathBuf,
    pub wal_mode: bool,
    pub busy_timeout: Duration,
    pub drain_poll_interval: Duration,
}

impl From<&StorageConfig> for ContextSettings {
    fn from(config: &StorageConfig) -> Self {
        Self {
            path: config.database_path(),
            wal_mode: config.wal_mode,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            drain_poll_interval: Duration::from_millis(config.drain_poll_interval_ms.max(1)),
        }
    }
}

pub(crate) struct Context {
    id: u64,
    generation: u64,
    conn: ReentrantMutex<Connection>,
}

impl Context {
    /// Open the database file, apply PRAGMAs and bring the schema up to date.
    pub fn open(id: u64, generation: u64, settings: &ContextSettings) -> Result<Self, TempoError> {
        if let Some(parent) = settings.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&settings.path).map_err(TempoError::storage)?;
        conn.busy_timeout(settings.busy_timeout)
            .map_err(TempoError::storage)?;
        if settings.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
                .map_err(TempoError::storage)?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(TempoError::storage)?;

        migrations::run_migrations(&mut conn)?;

        debug!(
            context = id,
            generation,
            path = %settings.path.display(),
            "database context opened"
        );
        Ok(Self {
            id,
            generation,
            conn: ReentrantMutex::new(conn),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run a closure against the connection.
    pub fn call<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn begin(&self) -> Result<(), TempoError> {
        self.call(|conn| conn.execute_batch("BEGIN IMMEDIATE;"))
            .map_err(TempoError::storage)
    }

    pub fn commit(&self) -> Result<(), TempoError> {
        self.call(|conn| conn.execute_batch("COMMIT;"))
            .map_err(TempoError::storage)
    }

    /// Roll back the open transaction. A transaction SQLite already ended on
    /// its own counts as rolled back.
    pub fn rollback(&self) -> Result<(), TempoError> {
        self.call(|conn| {
            if conn.is_autocommit() {
                return Ok(());
            }
            conn.execute_batch("ROLLBACK;")
        })
        .map_err(TempoError::storage)
    }

    pub fn in_transaction(&self) -> bool {
        self.call(|conn| Ok(!conn.is_autocommit())).unwrap_or(false)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        debug!(context = self.id, generation = self.generation, "database context closed");
    }
}

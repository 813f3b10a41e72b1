// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tempo client database.

use thiserror::Error;

/// The primary error type used across the database layer and its stores.
#[derive(Debug, Error)]
pub enum TempoError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (opening the file, query failure, commit failure, blob I/O).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Applying schema migrations failed. The prior schema version is left on disk.
    #[error("migration failed: {source}")]
    Migration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The database file was written by a newer client.
    #[error("database schema version {found} is newer than supported version {expected}")]
    SchemaTooNew { found: i64, expected: i64 },

    /// The requested operation would wait on a usage held by the calling thread.
    #[error("operation would deadlock: {0}")]
    WouldDeadlock(String),

    /// The context factory was closed.
    #[error("context factory has been closed")]
    Disposed,

    /// A record looked up by id does not exist.
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TempoError {
    /// Wrap any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TempoError::Storage { source: err.into() }
    }

    /// Whether this error came from SQLite or the filesystem.
    pub fn is_storage(&self) -> bool {
        matches!(self, TempoError::Storage { .. })
    }
}

impl From<std::io::Error> for TempoError {
    fn from(err: std::io::Error) -> Self {
        TempoError::Storage {
            source: Box::new(err),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tempo client database.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Tempo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TempoConfig {
    /// Database location and connection behaviour.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the database file and the `files/` blob store.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database file stem. The file on disk is `<database_name>.db`.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a connection waits on a locked database file before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Upper bound between checks while draining usages for a blocking section.
    #[serde(default = "default_drain_poll_interval_ms")]
    pub drain_poll_interval_ms: u64,
}

impl StorageConfig {
    /// Storage settings rooted at `data_dir`, everything else default.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(format!("{}.db", self.database_name))
    }

    /// Directory of the content-addressed blob store.
    pub fn files_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("files")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_name: default_database_name(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
            drain_poll_interval_ms: default_drain_poll_interval_ms(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("tempo"))
        .unwrap_or_else(|| PathBuf::from("tempo-data"))
        .to_string_lossy()
        .into_owned()
}

fn default_database_name() -> String {
    "client".to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_drain_poll_interval_ms() -> u64 {
    50
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

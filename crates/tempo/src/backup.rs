// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tempo-db backup` command implementation.
//!
//! Blocks every database operation, then copies the file with rusqlite's
//! Backup API. The copy is taken from a separate read-only connection, so it
//! is consistent even in WAL mode.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use tempo_core::TempoError;
use tempo_storage::ContextFactory;

/// Copy the database behind `factory` to `backup_path`. Returns the size of
/// the copy in bytes.
pub fn run_backup(factory: &ContextFactory, backup_path: &Path) -> Result<u64, TempoError> {
    let db_path = factory.database_path();
    if backup_path == db_path {
        return Err(TempoError::Internal(
            "backup destination is the database itself".to_string(),
        ));
    }
    if let Some(parent) = backup_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let section = factory.block_all_operations()?;

    let src = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(TempoError::storage)?;
    let mut dst = Connection::open(backup_path).map_err(TempoError::storage)?;

    let backup = rusqlite::backup::Backup::new(&src, &mut dst).map_err(TempoError::storage)?;
    // Copy 100 pages per step, sleep 10ms between steps.
    backup
        .run_to_completion(100, Duration::from_millis(10), None)
        .map_err(TempoError::storage)?;
    drop(backup);
    drop(section);

    let size = std::fs::metadata(backup_path)?.len();
    info!(path = %backup_path.display(), bytes = size, "backup written");
    let size_mb = size as f64 / (1024.0 * 1024.0);
    eprintln!(
        "Backup complete: {size_mb:.1} MB written to {}",
        backup_path.display()
    );
    Ok(size)
}

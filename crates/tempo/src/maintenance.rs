// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tempo-db migrate`, `tempo-db reset` and `tempo-db cleanup`.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use tempo_core::TempoError;
use tempo_storage::ContextFactory;
use tempo_storage::migrations;
use tempo_storage::queries::{beatmaps, files, scores, skins};

/// What a cleanup pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub beatmap_sets: usize,
    pub scores: usize,
    pub skins: usize,
    pub files: usize,
}

/// Migrate the database at `db_path` without opening a context factory, so
/// the version before and after can be reported.
pub fn run_migrate(db_path: &Path) -> Result<(), TempoError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(db_path).map_err(TempoError::storage)?;
    let before = migrations::applied_version(&conn)?;
    migrations::run_migrations(&mut conn)?;
    let after = migrations::applied_version(&conn)?;

    if before == after {
        eprintln!("Schema is current (version {after}).");
    } else {
        eprintln!("Schema migrated from version {before} to {after}.");
    }
    Ok(())
}

pub fn run_reset(factory: &ContextFactory) -> Result<(), TempoError> {
    factory.reset_database()?;
    eprintln!("Database reset: {}", factory.database_path().display());
    Ok(())
}

/// Purge delete-pending records, then collect blobs nothing references.
///
/// Runs as one write group so a failure leaves every record in place.
pub fn run_cleanup(factory: &ContextFactory) -> Result<CleanupReport, TempoError> {
    let usage = factory.write()?;
    let mut report = CleanupReport {
        scores: scores::purge_deletable(factory)?,
        beatmap_sets: beatmaps::purge_deletable(factory)?,
        skins: skins::purge_deletable(factory)?,
        ..CleanupReport::default()
    };
    report.files = files::cleanup(factory)?;
    usage.finish()?;

    info!(?report, "cleanup finished");
    eprintln!(
        "Removed {} beatmap sets, {} scores, {} skins and {} files.",
        report.beatmap_sets, report.scores, report.skins, report.files
    );
    Ok(report)
}

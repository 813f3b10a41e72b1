// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary via
//! `embed_migrations!`. They run on every context construction, grouped into a
//! single transaction, so a failed upgrade leaves the previous schema on disk.

use refinery::Target;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use tempo_core::TempoError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i64 = 2;

const HISTORY_TABLE: &str = "refinery_schema_history";

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// Fails with [`TempoError::SchemaTooNew`] when the file was written by a
/// newer client, before touching anything.
pub fn run_migrations(conn: &mut Connection) -> Result<(), TempoError> {
    migrate(conn, None)
}

/// Apply migrations up to and including `version`.
pub fn migrate_to(conn: &mut Connection, version: i64) -> Result<(), TempoError> {
    migrate(conn, Some(version))
}

fn migrate(conn: &mut Connection, target: Option<i64>) -> Result<(), TempoError> {
    let found = applied_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(TempoError::SchemaTooNew {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    if target.is_none() && found == SCHEMA_VERSION {
        return Ok(());
    }

    let mut runner = embedded::migrations::runner().set_grouped(true);
    if let Some(version) = target {
        let target = version
            .try_into()
            .map_err(|_| TempoError::Internal(format!("invalid schema version {version}")))?;
        runner = runner.set_target(Target::Version(target));
    }

    let report = runner.run(conn).map_err(|e| TempoError::Migration {
        source: Box::new(e),
    })?;

    for migration in report.applied_migrations() {
        info!(
            version = migration.version(),
            name = migration.name(),
            "applied schema migration"
        );
    }
    Ok(())
}

/// Highest migration version recorded in the file, `0` for a fresh database.
pub fn applied_version(conn: &Connection) -> Result<i64, TempoError> {
    let has_history: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [HISTORY_TABLE],
            |row| row.get(0),
        )
        .optional()
        .map_err(TempoError::storage)?;
    if has_history.is_none() {
        return Ok(0);
    }

    let version: Option<i64> = conn
        .query_row(
            &format!("SELECT MAX(version) FROM {HISTORY_TABLE}"),
            [],
            |row| row.get(0),
        )
        .map_err(TempoError::storage)?;
    Ok(version.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            > 0
    }

    fn column_type(conn: &Connection, table: &str, column: &str) -> String {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
            .unwrap();
        rows.map(|r| r.unwrap())
            .find(|(name, _)| name == column)
            .map(|(_, ty)| ty)
            .unwrap()
    }

    #[test]
    fn fresh_database_reaches_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(applied_version(&conn).unwrap(), 0);

        run_migrations(&mut conn).unwrap();

        assert_eq!(applied_version(&conn).unwrap(), SCHEMA_VERSION);
        for table in [
            "files",
            "beatmap_sets",
            "beatmaps",
            "beatmap_set_files",
            "scores",
            "score_files",
            "skins",
            "skin_files",
            "settings",
            "key_bindings",
        ] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn running_twice_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(applied_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn rekey_drops_integer_key_bindings() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 1).unwrap();
        assert_eq!(applied_version(&conn).unwrap(), 1);
        assert_eq!(column_type(&conn, "key_bindings", "id"), "INTEGER");
        conn.execute(
            "INSERT INTO key_bindings (ruleset_id, variant, action, key_combination)
             VALUES (0, 4, 1, 'Z')",
            [],
        )
        .unwrap();

        run_migrations(&mut conn).unwrap();

        assert_eq!(column_type(&conn, "key_bindings", "id"), "TEXT");
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM key_bindings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {HISTORY_TABLE} (version, name, applied_on, checksum)
                 VALUES (99, 'from_the_future', '2030-01-01T00:00:00Z', '0')"
            ),
            [],
        )
        .unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            TempoError::SchemaTooNew {
                found: 99,
                expected: SCHEMA_VERSION
            }
        ));
    }

    #[test]
    fn failed_migration_leaves_no_partial_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        // Collides with the last table the initial schema creates.
        conn.execute_batch("CREATE TABLE key_bindings (x INTEGER);")
            .unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, TempoError::Migration { .. }));
        assert!(!table_exists(&conn, "files"));
        assert!(!table_exists(&conn, "beatmap_sets"));
        assert_eq!(applied_version(&conn).unwrap(), 0);
    }
}

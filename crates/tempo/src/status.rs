// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tempo-db status` command implementation.
//!
//! Reports where the database lives, its schema version, the health check
//! result and how many records each store holds.

use std::io::IsTerminal;

use serde::Serialize;

use tempo_core::{HealthStatus, TempoError};
use tempo_storage::{ContextFactory, SCHEMA_VERSION, StatsSnapshot};

/// Row counts per store.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct RecordCounts {
    pub beatmap_sets: i64,
    pub beatmaps: i64,
    pub scores: i64,
    pub skins: i64,
    pub files: i64,
    pub settings: i64,
    pub key_bindings: i64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub schema_version: i64,
    pub expected_schema_version: i64,
    pub pool_generation: u64,
    pub health: String,
    pub detail: Option<String>,
    pub records: RecordCounts,
    pub stats: StatsSnapshot,
}

impl StatusResponse {
    pub fn collect(factory: &ContextFactory) -> Result<Self, TempoError> {
        let (health, detail) = match factory.health_check() {
            HealthStatus::Healthy => ("healthy", None),
            HealthStatus::Degraded(reason) => ("degraded", Some(reason)),
            HealthStatus::Unhealthy(reason) => ("unhealthy", Some(reason)),
        };
        Ok(Self {
            database_path: factory.database_path().display().to_string(),
            schema_version: factory.schema_version()?,
            expected_schema_version: SCHEMA_VERSION,
            pool_generation: factory.generation(),
            health: health.to_string(),
            detail,
            records: count_records(factory)?,
            stats: factory.stats(),
        })
    }
}

fn count_records(factory: &ContextFactory) -> Result<RecordCounts, TempoError> {
    factory.get()?.call(|conn| {
        let count = |table: &str| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
        };
        Ok(RecordCounts {
            beatmap_sets: count("beatmap_sets")?,
            beatmaps: count("beatmaps")?,
            scores: count("scores")?,
            skins: count("skins")?,
            files: count("files")?,
            settings: count("settings")?,
            key_bindings: count("key_bindings")?,
        })
    })
}

/// Run the `tempo-db status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub fn run_status(factory: &ContextFactory, json: bool, plain: bool) -> Result<(), TempoError> {
    let status = StatusResponse::collect(factory)?;
    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| TempoError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  tempo-db status");
    println!("  {}", "-".repeat(35));
    println!("    Database: {}", status.database_path);
    println!(
        "    Schema:   {} (expected {})",
        status.schema_version, status.expected_schema_version
    );

    let detail = status
        .detail
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default();
    if use_color {
        use colored::Colorize;
        let state = match status.health.as_str() {
            "healthy" => format!("{} {}", "✓".green(), status.health.green()),
            "degraded" => format!("{} {}", "!".yellow(), status.health.yellow()),
            _ => format!("{} {}", "✗".red(), status.health.red()),
        };
        println!("    State:    {state}{detail}");
    } else {
        let tag = match status.health.as_str() {
            "healthy" => "[OK]",
            "degraded" => "[WARN]",
            _ => "[FAIL]",
        };
        println!("    State:    {tag} {}{detail}", status.health);
    }

    let r = &status.records;
    println!();
    println!(
        "    Records:  {} sets, {} beatmaps, {} scores, {} skins",
        r.beatmap_sets, r.beatmaps, r.scores, r.skins
    );
    println!(
        "              {} files, {} settings, {} key bindings",
        r.files, r.settings, r.key_bindings
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_storage::queries::{beatmaps, settings};
    use tempo_test_utils::{TestDatabase, fixtures};

    #[test]
    fn collect_counts_records() {
        let db = TestDatabase::new();
        beatmaps::add_set(&db.factory, &fixtures::beatmap_set(Some(9), &["A", "B"])).unwrap();
        settings::upsert(&db.factory, &fixtures::global_setting("volume", "1")).unwrap();

        let status = StatusResponse::collect(&db.factory).unwrap();
        assert_eq!(status.health, "healthy");
        assert_eq!(status.schema_version, SCHEMA_VERSION);
        assert_eq!(
            status.records,
            RecordCounts {
                beatmap_sets: 1,
                beatmaps: 2,
                settings: 1,
                ..RecordCounts::default()
            }
        );
    }

    #[test]
    fn status_response_serializes() {
        let db = TestDatabase::new();
        let status = StatusResponse::collect(&db.factory).unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["health"], "healthy");
        assert_eq!(json["expected_schema_version"], SCHEMA_VERSION);
        assert!(json["stats"]["reads"].as_u64().unwrap() > 0);
        assert!(json["detail"].is_null());
    }
}

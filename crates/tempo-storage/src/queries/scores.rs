// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local score operations.

use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use tempo_core::{ScoreInfo, ScoreRank, TempoError};

use crate::factory::ContextFactory;
use crate::queries::conversion_error;
use crate::queries::files::{self, FileOwner};

const SCORE_COLUMNS: &str = "id, beatmap_id, ruleset_id, user_name, total_score, accuracy, \
                             max_combo, rank, achieved_at, delete_pending";

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<ScoreInfo> {
    let rank: String = row.get(7)?;
    Ok(ScoreInfo {
        id: row.get(0)?,
        beatmap_id: row.get(1)?,
        ruleset_id: row.get(2)?,
        user_name: row.get(3)?,
        total_score: row.get(4)?,
        accuracy: row.get(5)?,
        max_combo: row.get(6)?,
        rank: rank
            .parse::<ScoreRank>()
            .map_err(|e| conversion_error(7, e))?,
        achieved_at: row.get(8)?,
        delete_pending: row.get(9)?,
        files: Vec::new(),
    })
}

pub fn add(factory: &ContextFactory, score: &ScoreInfo) -> Result<ScoreInfo, TempoError> {
    let mut usage = factory.write()?;
    usage.execute(
        "INSERT INTO scores
            (beatmap_id, ruleset_id, user_name, total_score, accuracy, max_combo, rank,
             achieved_at, delete_pending)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
        params![
            score.beatmap_id,
            score.ruleset_id,
            score.user_name,
            score.total_score,
            score.accuracy,
            score.max_combo,
            score.rank.to_string(),
            score.achieved_at,
        ],
    )?;
    let id = usage.call(|conn| Ok(conn.last_insert_rowid()))?;
    let files = files::attach(&mut usage, FileOwner::Score, id, &score.files)?;
    usage.finish()?;

    Ok(ScoreInfo {
        id,
        delete_pending: false,
        files,
        ..score.clone()
    })
}

pub fn get(factory: &ContextFactory, id: i64) -> Result<Option<ScoreInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let score = conn
            .query_row(
                &format!("SELECT {SCORE_COLUMNS} FROM scores WHERE id = ?1"),
                [id],
                score_from_row,
            )
            .optional()?;
        score
            .map(|mut score| {
                score.files = files::attached(conn, FileOwner::Score, score.id)?;
                Ok(score)
            })
            .transpose()
    })
}

/// Live scores on a beatmap, best first.
pub fn for_beatmap(factory: &ContextFactory, beatmap_id: i64) -> Result<Vec<ScoreInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCORE_COLUMNS} FROM scores
             WHERE beatmap_id = ?1 AND delete_pending = 0
             ORDER BY total_score DESC, id ASC"
        ))?;
        let rows = stmt.query_map([beatmap_id], score_from_row)?;
        rows.collect()
    })
}

/// Soft-delete a score. Returns whether anything changed.
pub fn delete(factory: &ContextFactory, id: i64) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute(
        "UPDATE scores SET delete_pending = 1 WHERE id = ?1 AND delete_pending = 0",
        [id],
    )?;
    usage.finish()?;
    Ok(changed > 0)
}

/// Permanently remove delete-pending scores. Returns how many were removed.
pub fn purge_deletable(factory: &ContextFactory) -> Result<usize, TempoError> {
    let removed = purge_where(factory, "delete_pending = 1", params![])?;
    if removed > 0 {
        info!(removed, "purged deleted scores");
    }
    Ok(removed)
}

/// Remove every score on the beatmaps of a set, ahead of the set itself.
pub(crate) fn purge_for_set(factory: &ContextFactory, set_id: i64) -> Result<usize, TempoError> {
    purge_where(
        factory,
        "beatmap_id IN (SELECT id FROM beatmaps WHERE beatmap_set_id = ?1)",
        params![set_id],
    )
}

fn purge_where(
    factory: &ContextFactory,
    filter: &str,
    filter_params: &[&dyn rusqlite::ToSql],
) -> Result<usize, TempoError> {
    let mut usage = factory.write()?;
    let ids = usage.call(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT id FROM scores WHERE {filter}"))?;
        let rows = stmt.query_map(filter_params, |row| row.get::<_, i64>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
    })?;

    for &id in &ids {
        files::detach_all(factory, &mut usage, FileOwner::Score, id)?;
        usage.execute("DELETE FROM scores WHERE id = ?1", [id])?;
    }
    usage.finish()?;
    Ok(ids.len())
}

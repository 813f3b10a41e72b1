// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Beatmap set and beatmap operations.

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use tempo_core::{BeatmapInfo, BeatmapSetInfo, TempoError};

use crate::factory::ContextFactory;
use crate::queries::files::{self, FileOwner};

const SET_COLUMNS: &str = "id, online_id, hash, date_added, delete_pending, protected";

fn set_from_row(row: &Row<'_>) -> rusqlite::Result<BeatmapSetInfo> {
    Ok(BeatmapSetInfo {
        id: row.get(0)?,
        online_id: row.get(1)?,
        hash: row.get(2)?,
        date_added: row.get(3)?,
        delete_pending: row.get(4)?,
        protected: row.get(5)?,
        beatmaps: Vec::new(),
        files: Vec::new(),
    })
}

fn beatmap_from_row(row: &Row<'_>) -> rusqlite::Result<BeatmapInfo> {
    Ok(BeatmapInfo {
        id: row.get(0)?,
        beatmap_set_id: row.get(1)?,
        online_id: row.get(2)?,
        difficulty_name: row.get(3)?,
        ruleset_id: row.get(4)?,
        md5_hash: row.get(5)?,
        hidden: row.get(6)?,
    })
}

fn load_children(conn: &Connection, mut set: BeatmapSetInfo) -> rusqlite::Result<BeatmapSetInfo> {
    let mut stmt = conn.prepare(
        "SELECT id, beatmap_set_id, online_id, difficulty_name, ruleset_id, md5_hash, hidden
         FROM beatmaps WHERE beatmap_set_id = ?1 ORDER BY id ASC",
    )?;
    set.beatmaps = stmt
        .query_map([set.id], beatmap_from_row)?
        .collect::<rusqlite::Result<_>>()?;
    set.files = files::attached(conn, FileOwner::BeatmapSet, set.id)?;
    Ok(set)
}

/// Insert a beatmap set with its beatmaps and files. Returns the stored set
/// with ids filled in.
///
/// An older, delete-pending set with the same online id gives up that id to
/// the new import.
pub fn add_set(factory: &ContextFactory, set: &BeatmapSetInfo) -> Result<BeatmapSetInfo, TempoError> {
    let mut usage = factory.write()?;

    if let Some(online_id) = set.online_id {
        usage.execute(
            "UPDATE beatmap_sets SET online_id = NULL
             WHERE online_id = ?1 AND delete_pending = 1",
            [online_id],
        )?;
    }

    usage.execute(
        "INSERT INTO beatmap_sets (online_id, hash, date_added, delete_pending, protected)
         VALUES (?1, ?2, ?3, 0, ?4)",
        params![set.online_id, set.hash, set.date_added, set.protected],
    )?;
    let set_id = usage.call(|conn| Ok(conn.last_insert_rowid()))?;

    let mut beatmaps = Vec::with_capacity(set.beatmaps.len());
    for beatmap in &set.beatmaps {
        usage.execute(
            "INSERT INTO beatmaps
                (beatmap_set_id, online_id, difficulty_name, ruleset_id, md5_hash, hidden)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                set_id,
                beatmap.online_id,
                beatmap.difficulty_name,
                beatmap.ruleset_id,
                beatmap.md5_hash,
                beatmap.hidden,
            ],
        )?;
        let id = usage.call(|conn| Ok(conn.last_insert_rowid()))?;
        beatmaps.push(BeatmapInfo {
            id,
            beatmap_set_id: set_id,
            ..beatmap.clone()
        });
    }

    let files = files::attach(&mut usage, FileOwner::BeatmapSet, set_id, &set.files)?;
    usage.finish()?;

    debug!(set_id, beatmaps = beatmaps.len(), "beatmap set added");
    Ok(BeatmapSetInfo {
        id: set_id,
        delete_pending: false,
        beatmaps,
        files,
        ..set.clone()
    })
}

pub fn get_set(factory: &ContextFactory, id: i64) -> Result<Option<BeatmapSetInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let set = conn
            .query_row(
                &format!("SELECT {SET_COLUMNS} FROM beatmap_sets WHERE id = ?1"),
                [id],
                set_from_row,
            )
            .optional()?;
        set.map(|set| load_children(conn, set)).transpose()
    })
}

pub fn get_set_by_online_id(
    factory: &ContextFactory,
    online_id: i64,
) -> Result<Option<BeatmapSetInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let set = conn
            .query_row(
                &format!("SELECT {SET_COLUMNS} FROM beatmap_sets WHERE online_id = ?1"),
                [online_id],
                set_from_row,
            )
            .optional()?;
        set.map(|set| load_children(conn, set)).transpose()
    })
}

/// All sets not pending deletion, oldest first.
pub fn list_sets(factory: &ContextFactory) -> Result<Vec<BeatmapSetInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SET_COLUMNS} FROM beatmap_sets
             WHERE delete_pending = 0 ORDER BY date_added ASC, id ASC"
        ))?;
        let sets = stmt
            .query_map([], set_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        sets.into_iter().map(|set| load_children(conn, set)).collect()
    })
}

/// Hide a beatmap from song select. Returns whether anything changed.
pub fn hide(factory: &ContextFactory, beatmap_id: i64) -> Result<bool, TempoError> {
    set_hidden(factory, beatmap_id, true)
}

/// Undo [`hide`]. Returns whether anything changed.
pub fn restore(factory: &ContextFactory, beatmap_id: i64) -> Result<bool, TempoError> {
    set_hidden(factory, beatmap_id, false)
}

fn set_hidden(factory: &ContextFactory, beatmap_id: i64, hidden: bool) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute(
        "UPDATE beatmaps SET hidden = ?1 WHERE id = ?2 AND hidden <> ?1",
        params![hidden, beatmap_id],
    )?;
    usage.finish()?;
    Ok(changed > 0)
}

/// Soft-delete a set. Protected sets are never deleted. Returns whether
/// anything changed.
pub fn delete(factory: &ContextFactory, set_id: i64) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute(
        "UPDATE beatmap_sets SET delete_pending = 1
         WHERE id = ?1 AND delete_pending = 0 AND protected = 0",
        [set_id],
    )?;
    usage.finish()?;
    Ok(changed > 0)
}

/// Undo a soft delete. Returns whether anything changed.
pub fn undelete(factory: &ContextFactory, set_id: i64) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute(
        "UPDATE beatmap_sets SET delete_pending = 0 WHERE id = ?1 AND delete_pending = 1",
        [set_id],
    )?;
    usage.finish()?;
    Ok(changed > 0)
}

/// Permanently remove delete-pending sets, their beatmaps, scores and file
/// joins. Returns how many sets were removed.
pub fn purge_deletable(factory: &ContextFactory) -> Result<usize, TempoError> {
    let mut usage = factory.write()?;
    let doomed = usage.call(|conn| {
        let mut stmt = conn.prepare("SELECT id FROM beatmap_sets WHERE delete_pending = 1")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
    })?;

    for &set_id in &doomed {
        super::scores::purge_for_set(factory, set_id)?;
        files::detach_all(factory, &mut usage, FileOwner::BeatmapSet, set_id)?;
        usage.execute("DELETE FROM beatmaps WHERE beatmap_set_id = ?1", [set_id])?;
        usage.execute("DELETE FROM beatmap_sets WHERE id = ?1", [set_id])?;
    }
    usage.finish()?;

    if !doomed.is_empty() {
        info!(removed = doomed.len(), "purged deleted beatmap sets");
    }
    Ok(doomed.len())
}

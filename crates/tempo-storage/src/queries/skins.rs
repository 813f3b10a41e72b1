// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Skin operations.

use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use tempo_core::{SkinInfo, TempoError};

use crate::factory::ContextFactory;
use crate::queries::files::{self, FileOwner};

fn skin_from_row(row: &Row<'_>) -> rusqlite::Result<SkinInfo> {
    Ok(SkinInfo {
        id: row.get(0)?,
        name: row.get(1)?,
        creator: row.get(2)?,
        hash: row.get(3)?,
        delete_pending: row.get(4)?,
        files: Vec::new(),
    })
}

pub fn add(factory: &ContextFactory, skin: &SkinInfo) -> Result<SkinInfo, TempoError> {
    let mut usage = factory.write()?;
    usage.execute(
        "INSERT INTO skins (name, creator, hash, delete_pending) VALUES (?1, ?2, ?3, 0)",
        params![skin.name, skin.creator, skin.hash],
    )?;
    let id = usage.call(|conn| Ok(conn.last_insert_rowid()))?;
    let files = files::attach(&mut usage, FileOwner::Skin, id, &skin.files)?;
    usage.finish()?;

    Ok(SkinInfo {
        id,
        delete_pending: false,
        files,
        ..skin.clone()
    })
}

pub fn get(factory: &ContextFactory, id: i64) -> Result<Option<SkinInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let skin = conn
            .query_row(
                "SELECT id, name, creator, hash, delete_pending FROM skins WHERE id = ?1",
                [id],
                skin_from_row,
            )
            .optional()?;
        skin.map(|mut skin| {
            skin.files = files::attached(conn, FileOwner::Skin, skin.id)?;
            Ok(skin)
        })
        .transpose()
    })
}

/// Skins that can be selected, ordered by name.
pub fn list_usable(factory: &ContextFactory) -> Result<Vec<SkinInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, name, creator, hash, delete_pending FROM skins
             WHERE delete_pending = 0 ORDER BY name COLLATE NOCASE ASC, id ASC",
        )?;
        let rows = stmt.query_map([], skin_from_row)?;
        rows.collect()
    })
}

/// Soft-delete a skin. Returns whether anything changed.
pub fn delete(factory: &ContextFactory, id: i64) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute(
        "UPDATE skins SET delete_pending = 1 WHERE id = ?1 AND delete_pending = 0",
        [id],
    )?;
    usage.finish()?;
    Ok(changed > 0)
}

/// Undo a soft delete. Returns whether anything changed.
pub fn undelete(factory: &ContextFactory, id: i64) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute(
        "UPDATE skins SET delete_pending = 0 WHERE id = ?1 AND delete_pending = 1",
        [id],
    )?;
    usage.finish()?;
    Ok(changed > 0)
}

/// Permanently remove delete-pending skins together with their settings and
/// file joins. Returns how many skins were removed.
pub fn purge_deletable(factory: &ContextFactory) -> Result<usize, TempoError> {
    let mut usage = factory.write()?;
    let ids = usage.call(|conn| {
        let mut stmt = conn.prepare("SELECT id FROM skins WHERE delete_pending = 1")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
    })?;

    for &id in &ids {
        usage.execute("DELETE FROM settings WHERE skin_id = ?1", [id])?;
        files::detach_all(factory, &mut usage, FileOwner::Skin, id)?;
        usage.execute("DELETE FROM skins WHERE id = ?1", [id])?;
    }
    usage.finish()?;

    if !ids.is_empty() {
        info!(removed = ids.len(), "purged deleted skins");
    }
    Ok(ids.len())
}

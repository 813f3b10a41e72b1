// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped settings. A setting belongs to a ruleset variant, a skin, or to
//! the client globally when every scope column is `NULL`.

use rusqlite::{OptionalExtension, Row, params};

use tempo_core::{Setting, TempoError};

use crate::factory::ContextFactory;

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<Setting> {
    Ok(Setting {
        id: row.get(0)?,
        ruleset_id: row.get(1)?,
        variant: row.get(2)?,
        skin_id: row.get(3)?,
        key: row.get(4)?,
        value: row.get(5)?,
    })
}

/// Settings in exactly the given scope. `None` matches only `NULL`.
pub fn query(
    factory: &ContextFactory,
    ruleset_id: Option<i64>,
    variant: Option<i64>,
    skin_id: Option<i64>,
) -> Result<Vec<Setting>, TempoError> {
    factory.get()?.call(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, ruleset_id, variant, skin_id, key, value FROM settings
             WHERE ruleset_id IS ?1 AND variant IS ?2 AND skin_id IS ?3
             ORDER BY key ASC",
        )?;
        let rows = stmt.query_map(params![ruleset_id, variant, skin_id], setting_from_row)?;
        rows.collect()
    })
}

/// Insert the setting, or overwrite the value of the one with the same key
/// in the same scope.
pub fn upsert(factory: &ContextFactory, setting: &Setting) -> Result<Setting, TempoError> {
    let mut usage = factory.write()?;
    let existing: Option<i64> = usage.call(|conn| {
        conn.query_row(
            "SELECT id FROM settings
             WHERE ruleset_id IS ?1 AND variant IS ?2 AND skin_id IS ?3 AND key = ?4",
            params![setting.ruleset_id, setting.variant, setting.skin_id, setting.key],
            |row| row.get(0),
        )
        .optional()
    })?;

    let id = match existing {
        Some(id) => {
            usage.execute(
                "UPDATE settings SET value = ?1 WHERE id = ?2",
                params![setting.value, id],
            )?;
            id
        }
        None => {
            usage.execute(
                "INSERT INTO settings (ruleset_id, variant, skin_id, key, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    setting.ruleset_id,
                    setting.variant,
                    setting.skin_id,
                    setting.key,
                    setting.value,
                ],
            )?;
            usage.call(|conn| Ok(conn.last_insert_rowid()))?
        }
    };
    usage.finish()?;

    Ok(Setting {
        id,
        ..setting.clone()
    })
}

/// Remove a setting. Returns whether it existed.
pub fn delete(factory: &ContextFactory, id: i64) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute("DELETE FROM settings WHERE id = ?1", [id])?;
    usage.finish()?;
    Ok(changed > 0)
}

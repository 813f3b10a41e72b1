// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key binding operations.

use std::collections::HashSet;

use rusqlite::{Row, params};
use tracing::debug;
use uuid::Uuid;

use tempo_core::{KeyBinding, TempoError};

use crate::factory::ContextFactory;

fn binding_from_row(row: &Row<'_>) -> rusqlite::Result<KeyBinding> {
    Ok(KeyBinding {
        id: row.get(0)?,
        ruleset_id: row.get(1)?,
        variant: row.get(2)?,
        action: row.get(3)?,
        key_combination: row.get(4)?,
    })
}

/// Bindings for a ruleset variant (`None`, `None` for global bindings).
pub fn query(
    factory: &ContextFactory,
    ruleset_id: Option<i64>,
    variant: Option<i64>,
) -> Result<Vec<KeyBinding>, TempoError> {
    factory.get()?.call(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, ruleset_id, variant, action, key_combination FROM key_bindings
             WHERE ruleset_id IS ?1 AND variant IS ?2
             ORDER BY action ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![ruleset_id, variant], binding_from_row)?;
        rows.collect()
    })
}

/// Insert a default binding for every action that has none yet. Returns how
/// many bindings were inserted.
pub fn insert_defaults(
    factory: &ContextFactory,
    ruleset_id: Option<i64>,
    variant: Option<i64>,
    defaults: &[(i64, &str)],
) -> Result<usize, TempoError> {
    let mut usage = factory.write()?;
    let bound: HashSet<i64> = usage.call(|conn| {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT action FROM key_bindings WHERE ruleset_id IS ?1 AND variant IS ?2",
        )?;
        let rows = stmt.query_map(params![ruleset_id, variant], |row| row.get(0))?;
        rows.collect()
    })?;

    let mut inserted = 0;
    for &(action, combination) in defaults {
        if bound.contains(&action) {
            continue;
        }
        usage.execute(
            "INSERT INTO key_bindings (id, ruleset_id, variant, action, key_combination)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                ruleset_id,
                variant,
                action,
                combination
            ],
        )?;
        inserted += 1;
    }
    usage.finish()?;

    debug!(?ruleset_id, ?variant, inserted, "default key bindings inserted");
    Ok(inserted)
}

/// Rebind an existing binding to a new key combination.
pub fn update_combination(
    factory: &ContextFactory,
    id: &str,
    key_combination: &str,
) -> Result<(), TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute(
        "UPDATE key_bindings SET key_combination = ?1 WHERE id = ?2",
        params![key_combination, id],
    )?;
    if changed == 0 {
        let err = TempoError::NotFound {
            entity: "key binding",
            id: id.to_string(),
        };
        usage.record_error(&err);
        return Err(err);
    }
    usage.finish()?;
    Ok(())
}

/// Remove a binding. Returns whether it existed.
pub fn delete(factory: &ContextFactory, id: &str) -> Result<bool, TempoError> {
    let mut usage = factory.write()?;
    let changed = usage.execute("DELETE FROM key_bindings WHERE id = ?1", [id])?;
    usage.finish()?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use tempo_config::StorageConfig;

    use super::*;

    const DEFAULTS: &[(i64, &str)] = &[(0, "Z"), (1, "X"), (2, "MouseLeft")];

    #[test]
    fn defaults_fill_only_missing_actions() {
        let dir = tempdir().unwrap();
        let factory = ContextFactory::open(StorageConfig::in_dir(dir.path())).unwrap();

        assert_eq!(insert_defaults(&factory, Some(0), Some(0), DEFAULTS).unwrap(), 3);
        assert_eq!(insert_defaults(&factory, Some(0), Some(0), DEFAULTS).unwrap(), 0);
        assert_eq!(insert_defaults(&factory, Some(1), Some(0), &DEFAULTS[..1]).unwrap(), 1);

        let bindings = query(&factory, Some(0), Some(0)).unwrap();
        assert_eq!(bindings.len(), 3);
        assert!(bindings.iter().all(|b| Uuid::parse_str(&b.id).is_ok()));
        assert_eq!(bindings[2].key_combination, "MouseLeft");
    }

    #[test]
    fn rebinding_and_deleting() {
        let dir = tempdir().unwrap();
        let factory = ContextFactory::open(StorageConfig::in_dir(dir.path())).unwrap();
        insert_defaults(&factory, None, None, &[(7, "F1")]).unwrap();
        let binding = query(&factory, None, None).unwrap().remove(0);

        update_combination(&factory, &binding.id, "Control-F1").unwrap();
        assert_eq!(
            query(&factory, None, None).unwrap()[0].key_combination,
            "Control-F1"
        );

        let missing = update_combination(&factory, "not-a-binding", "F2").unwrap_err();
        assert!(matches!(missing, TempoError::NotFound { .. }));

        assert!(delete(&factory, &binding.id).unwrap());
        assert!(query(&factory, None, None).unwrap().is_empty());
    }
}

// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-addressed file store with reference counting.
//!
//! Blobs live under `<data_dir>/files/<h0>/<h0h1>/<hash>`. A row in `files`
//! tracks how many records point at a blob; [`cleanup`] removes the ones no
//! record references anymore.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Row, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use tempo_core::{FileInfo, NamedFile, TempoError};

use crate::factory::ContextFactory;
use crate::write::WriteUsage;

/// Record kinds that attach named files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOwner {
    BeatmapSet,
    Score,
    Skin,
}

impl FileOwner {
    fn table(self) -> &'static str {
        match self {
            FileOwner::BeatmapSet => "beatmap_set_files",
            FileOwner::Score => "score_files",
            FileOwner::Skin => "skin_files",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            FileOwner::BeatmapSet => "beatmap_set_id",
            FileOwner::Score => "score_id",
            FileOwner::Skin => "skin_id",
        }
    }
}

/// Lowercase SHA-256 hex digest of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileInfo> {
    Ok(FileInfo {
        id: row.get(0)?,
        hash: row.get(1)?,
        reference_count: row.get(2)?,
    })
}

/// Store `data`, deduplicated by hash, and take one reference to it.
pub fn add(factory: &ContextFactory, data: &[u8]) -> Result<FileInfo, TempoError> {
    let hash = hash_bytes(data);
    let mut usage = factory.write()?;

    let existing = usage.call(|conn| {
        conn.query_row(
            "SELECT id, hash, reference_count FROM files WHERE hash = ?1",
            [&hash],
            file_from_row,
        )
        .optional()
    })?;

    let mut info = match existing {
        Some(info) => info,
        None => {
            usage.execute("INSERT INTO files (hash, reference_count) VALUES (?1, 0)", [&hash])?;
            let id = usage.call(|conn| Ok(conn.last_insert_rowid()))?;
            FileInfo {
                id,
                hash,
                reference_count: 0,
            }
        }
    };

    let path = factory.files_dir().join(info.storage_path());
    if !path.exists() {
        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&path, data));
        if let Err(err) = written {
            usage.record_error(&err);
            return Err(err.into());
        }
        debug!(hash = %info.hash, bytes = data.len(), "stored file blob");
    }

    usage.execute(
        "UPDATE files SET reference_count = reference_count + 1 WHERE id = ?1",
        [info.id],
    )?;
    info.reference_count += 1;
    usage.finish()?;
    Ok(info)
}

/// Take one more reference to each file.
pub fn reference(factory: &ContextFactory, file_ids: &[i64]) -> Result<(), TempoError> {
    adjust_references(factory, file_ids, 1)
}

/// Drop one reference to each file. Unreferenced blobs stay on disk until
/// [`cleanup`] runs.
pub fn dereference(factory: &ContextFactory, file_ids: &[i64]) -> Result<(), TempoError> {
    adjust_references(factory, file_ids, -1)
}

fn adjust_references(
    factory: &ContextFactory,
    file_ids: &[i64],
    delta: i64,
) -> Result<(), TempoError> {
    let mut usage = factory.write()?;
    for &id in file_ids {
        let changed = usage.execute(
            "UPDATE files SET reference_count = MAX(reference_count + ?1, 0) WHERE id = ?2",
            params![delta, id],
        )?;
        if changed == 0 {
            let err = TempoError::NotFound {
                entity: "file",
                id: id.to_string(),
            };
            usage.record_error(&err);
            return Err(err);
        }
    }
    usage.finish()?;
    Ok(())
}

pub fn get(factory: &ContextFactory, id: i64) -> Result<Option<FileInfo>, TempoError> {
    factory.get()?.call(|conn| {
        conn.query_row(
            "SELECT id, hash, reference_count FROM files WHERE id = ?1",
            [id],
            file_from_row,
        )
        .optional()
    })
}

/// Files with at least one reference.
pub fn query_referenced(factory: &ContextFactory) -> Result<Vec<FileInfo>, TempoError> {
    factory.get()?.call(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, hash, reference_count FROM files
             WHERE reference_count > 0 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], file_from_row)?;
        rows.collect()
    })
}

/// Delete every unreferenced file row and every blob on disk that no row
/// points at. Returns how many files were removed.
///
/// Blobs are deleted only once the enclosing write group commits, so a
/// rolled-back cleanup leaves them in place. A blob left behind by a
/// rolled-back [`add`] has no row and is collected here too.
pub fn cleanup(factory: &ContextFactory) -> Result<usize, TempoError> {
    let mut usage = factory.write()?;
    let (unreferenced, known) = usage.call(|conn| {
        let mut stmt = conn.prepare("SELECT id, hash, reference_count FROM files")?;
        let rows = stmt.query_map([], file_from_row)?;
        let mut unreferenced = Vec::new();
        let mut known = HashSet::new();
        for file in rows {
            let file = file?;
            known.insert(file.hash.clone());
            if file.reference_count <= 0 {
                unreferenced.push(file);
            }
        }
        Ok((unreferenced, known))
    })?;

    for file in &unreferenced {
        usage.execute("DELETE FROM files WHERE id = ?1", [file.id])?;
    }

    let files_dir = factory.files_dir();
    let stray = match stray_blobs(&files_dir, &known) {
        Ok(stray) => stray,
        Err(err) => {
            usage.record_error(&err);
            return Err(err.into());
        }
    };

    let removed = unreferenced.len() + stray.len();
    let doomed: Vec<PathBuf> = unreferenced
        .iter()
        .map(|file| files_dir.join(file.storage_path()))
        .chain(stray)
        .collect();
    if !doomed.is_empty() {
        usage.after_commit(move || remove_blobs(doomed));
    }
    usage.finish()?;

    if removed > 0 {
        info!(removed, "cleaned up unreferenced files");
    }
    Ok(removed)
}

/// Blob files under `files_dir` whose hash has no row.
fn stray_blobs(files_dir: &Path, known: &HashSet<String>) -> std::io::Result<Vec<PathBuf>> {
    let mut stray = Vec::new();
    let shards = match std::fs::read_dir(files_dir) {
        Ok(shards) => shards,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(stray),
        Err(err) => return Err(err),
    };
    for shard in shards {
        let shard = shard?.path();
        if !shard.is_dir() {
            continue;
        }
        for bucket in std::fs::read_dir(&shard)? {
            let bucket = bucket?.path();
            if !bucket.is_dir() {
                continue;
            }
            for blob in std::fs::read_dir(&bucket)? {
                let blob = blob?.path();
                let orphaned = blob
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|hash| !known.contains(hash));
                if orphaned && blob.is_file() {
                    stray.push(blob);
                }
            }
        }
    }
    Ok(stray)
}

fn remove_blobs(paths: Vec<PathBuf>) {
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "deleted file blob"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            // Left for the next cleanup, which finds it without a row.
            Err(err) => warn!(path = %path.display(), error = %err, "could not delete file blob"),
        }
    }
}

/// Attach `files` to an owning record.
pub(crate) fn attach(
    usage: &mut WriteUsage,
    owner: FileOwner,
    owner_id: i64,
    files: &[NamedFile],
) -> Result<Vec<NamedFile>, TempoError> {
    let sql = format!(
        "INSERT INTO {} ({}, file_id, filename) VALUES (?1, ?2, ?3)",
        owner.table(),
        owner.owner_column()
    );
    let mut attached = Vec::with_capacity(files.len());
    for named in files {
        usage.execute(&sql, params![owner_id, named.file.id, named.filename])?;
        let id = usage.call(|conn| Ok(conn.last_insert_rowid()))?;
        attached.push(NamedFile {
            id,
            ..named.clone()
        });
    }
    Ok(attached)
}

/// Files attached to an owning record, in attachment order.
pub(crate) fn attached(
    conn: &Connection,
    owner: FileOwner,
    owner_id: i64,
) -> rusqlite::Result<Vec<NamedFile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT j.id, j.filename, f.id, f.hash, f.reference_count
         FROM {} j JOIN files f ON f.id = j.file_id
         WHERE j.{} = ?1 ORDER BY j.id ASC",
        owner.table(),
        owner.owner_column()
    ))?;
    let rows = stmt.query_map([owner_id], |row| {
        Ok(NamedFile {
            id: row.get(0)?,
            filename: row.get(1)?,
            file: FileInfo {
                id: row.get(2)?,
                hash: row.get(3)?,
                reference_count: row.get(4)?,
            },
        })
    })?;
    rows.collect()
}

/// Remove an owner's join rows and release its file references.
pub(crate) fn detach_all(
    factory: &ContextFactory,
    usage: &mut WriteUsage,
    owner: FileOwner,
    owner_id: i64,
) -> Result<(), TempoError> {
    let file_ids = usage.call(|conn| {
        attached(conn, owner, owner_id)
            .map(|files| files.into_iter().map(|f| f.file.id).collect::<Vec<_>>())
    })?;
    usage.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1",
            owner.table(),
            owner.owner_column()
        ),
        [owner_id],
    )?;
    dereference(factory, &file_ids)
}

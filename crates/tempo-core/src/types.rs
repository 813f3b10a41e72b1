// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record types persisted by the client database.
//!
//! Records are plain owned values. A record read on one thread is handed to
//! another thread by id and re-fetched there; nothing here is bound to a
//! database context. An `id` of `0` marks a record that has not been stored
//! yet.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by the database health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// A content-addressed blob tracked in the `files` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: i64,
    /// Lowercase SHA-256 hex digest of the content.
    pub hash: String,
    pub reference_count: i64,
}

impl FileInfo {
    /// Relative path of the blob inside the files directory: `a/ab/abcdef...`.
    pub fn storage_path(&self) -> PathBuf {
        let first = self.hash.get(..1).unwrap_or_default();
        let second = self.hash.get(..2).unwrap_or_default();
        PathBuf::from(first).join(second).join(&self.hash)
    }
}

/// A file attached to an owning record under a display filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedFile {
    pub id: i64,
    pub filename: String,
    pub file: FileInfo,
}

/// A set of beatmaps imported together (one archive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatmapSetInfo {
    pub id: i64,
    pub online_id: Option<i64>,
    pub hash: String,
    pub date_added: DateTime<Utc>,
    pub delete_pending: bool,
    /// Protected sets are never soft-deleted (the bundled default set).
    pub protected: bool,
    pub beatmaps: Vec<BeatmapInfo>,
    pub files: Vec<NamedFile>,
}

/// A single difficulty inside a beatmap set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatmapInfo {
    pub id: i64,
    pub beatmap_set_id: i64,
    pub online_id: Option<i64>,
    pub difficulty_name: String,
    pub ruleset_id: i64,
    pub md5_hash: String,
    pub hidden: bool,
}

/// Letter grade of a score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ScoreRank {
    XH,
    X,
    SH,
    S,
    A,
    B,
    C,
    D,
    F,
}

/// A locally stored play result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreInfo {
    pub id: i64,
    pub beatmap_id: i64,
    pub ruleset_id: i64,
    pub user_name: String,
    pub total_score: i64,
    pub accuracy: f64,
    pub max_combo: i64,
    pub rank: ScoreRank,
    pub achieved_at: DateTime<Utc>,
    pub delete_pending: bool,
    pub files: Vec<NamedFile>,
}

/// An imported skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinInfo {
    pub id: i64,
    pub name: String,
    pub creator: String,
    pub hash: String,
    pub delete_pending: bool,
    pub files: Vec<NamedFile>,
}

/// A persisted setting, optionally scoped to a ruleset variant or a skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub id: i64,
    pub ruleset_id: Option<i64>,
    pub variant: Option<i64>,
    pub skin_id: Option<i64>,
    pub key: String,
    pub value: String,
}

/// A key binding for a ruleset action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    /// UUID string primary key.
    pub id: String,
    pub ruleset_id: Option<i64>,
    pub variant: Option<i64>,
    pub action: i64,
    /// Serialized key combination, e.g. `Control-Shift-R`.
    pub key_combination: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_path_fans_out_by_hash_prefix() {
        let file = FileInfo {
            id: 1,
            hash: "abcdef0123".to_string(),
            reference_count: 1,
        };
        assert_eq!(
            file.storage_path(),
            PathBuf::from("a").join("ab").join("abcdef0123")
        );
    }

    #[test]
    fn storage_path_tolerates_short_hash() {
        let file = FileInfo {
            id: 1,
            hash: "a".to_string(),
            reference_count: 0,
        };
        assert_eq!(file.storage_path(), PathBuf::from("a").join("").join("a"));
    }
}

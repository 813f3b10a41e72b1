// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-made records for store tests. Ids are `0` (not yet stored).

use chrono::{TimeZone, Utc};

use tempo_core::{BeatmapInfo, BeatmapSetInfo, ScoreInfo, ScoreRank, Setting, SkinInfo};

/// A beatmap set with one difficulty per entry in `difficulties`.
pub fn beatmap_set(online_id: Option<i64>, difficulties: &[&str]) -> BeatmapSetInfo {
    BeatmapSetInfo {
        id: 0,
        online_id,
        hash: format!("set-{}", online_id.unwrap_or_default()),
        date_added: Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default(),
        delete_pending: false,
        protected: false,
        beatmaps: difficulties
            .iter()
            .enumerate()
            .map(|(i, name)| BeatmapInfo {
                id: 0,
                beatmap_set_id: 0,
                online_id: None,
                difficulty_name: (*name).to_string(),
                ruleset_id: 0,
                md5_hash: format!("md5-{i}-{name}"),
                hidden: false,
            })
            .collect(),
        files: Vec::new(),
    }
}

pub fn score(beatmap_id: i64, user_name: &str, total_score: i64) -> ScoreInfo {
    ScoreInfo {
        id: 0,
        beatmap_id,
        ruleset_id: 0,
        user_name: user_name.to_string(),
        total_score,
        accuracy: 0.95,
        max_combo: 300,
        rank: ScoreRank::A,
        achieved_at: Utc::now(),
        delete_pending: false,
        files: Vec::new(),
    }
}

pub fn skin(name: &str) -> SkinInfo {
    SkinInfo {
        id: 0,
        name: name.to_string(),
        creator: "fixture".to_string(),
        hash: format!("skin-{name}"),
        delete_pending: false,
        files: Vec::new(),
    }
}

/// A global setting (no ruleset, variant or skin scope).
pub fn global_setting(key: &str, value: &str) -> Setting {
    Setting {
        id: 0,
        ruleset_id: None,
        variant: None,
        skin_id: None,
        key: key.to_string(),
        value: value.to_string(),
    }
}

// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tempo client database.
//!
//! This crate provides the error type and the record types shared by the
//! storage layer, its stores, and the maintenance tooling.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TempoError;
pub use types::{
    BeatmapInfo, BeatmapSetInfo, FileInfo, HealthStatus, KeyBinding, NamedFile, ScoreInfo,
    ScoreRank, Setting, SkinInfo,
};

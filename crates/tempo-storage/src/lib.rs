// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Tempo client.
//!
//! Hands out per-thread database contexts, serializes every write through one
//! reentrant gate with group-level commit/rollback, can drain and block all
//! operations for maintenance, and keeps the schema current with embedded
//! migrations. Typed stores for files, beatmaps, scores, skins, settings and
//! key bindings are built on top in [`queries`].

mod context;
pub mod factory;
pub mod migrations;
mod pool;
pub mod queries;
pub mod stats;
pub mod write;

pub use factory::{BlockingSection, ContextFactory, ContextUsage};
pub use migrations::SCHEMA_VERSION;
pub use stats::recording::register_metrics;
pub use stats::{DatabaseStats, StatsSnapshot};
pub use write::{GroupOutcome, WriteUsage};

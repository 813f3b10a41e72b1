// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed stores over the context factory.
//!
//! Every mutation runs inside a write usage, so a store call made while the
//! caller already holds one joins the caller's write group.

pub mod beatmaps;
pub mod files;
pub mod key_bindings;
pub mod scores;
pub mod settings;
pub mod skins;

/// Wrap a column parse failure as a rusqlite conversion error.
fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

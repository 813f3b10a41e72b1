// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tempo database integration tests.
//!
//! # Components
//!
//! - [`TestDatabase`] - a context factory over a throwaway data directory
//! - [`fixtures`] - ready-made records for the stores

pub mod fixtures;
pub mod harness;

pub use harness::{TestDatabase, TestDatabaseBuilder};

// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tempo.toml` > `~/.config/tempo/tempo.toml` > `/etc/tempo/tempo.toml`
//! with environment variable overrides via `TEMPO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TempoConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tempo/tempo.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "tempo.toml";

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tempo").join("tempo.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tempo/tempo.toml` (system-wide)
/// 3. `~/.config/tempo/tempo.toml` (user XDG config)
/// 4. `./tempo.toml` (local directory)
/// 5. `TEMPO_*` environment variables
pub fn load_config() -> Result<TempoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TempoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TempoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TempoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TempoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TempoConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `TEMPO_STORAGE_DATA_DIR` must map to `storage.data_dir`,
/// not `storage.data.dir`. Figment hands over the key in its original case,
/// so it is lowercased before the section prefix is rewritten.
fn env_provider() -> Env {
    Env::prefixed("TEMPO_").map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        let mapped = key
            .replacen("storage_", "storage.", 1)
            .replacen("logging_", "logging.", 1);
        mapped.into()
    })
}

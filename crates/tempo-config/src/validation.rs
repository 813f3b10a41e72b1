// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, file stems without separators, and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::TempoConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TempoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let storage = &config.storage;

    if storage.data_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.data_dir must not be empty".to_string(),
        });
    }

    let name = storage.database_name.trim();
    if name.is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_name must not be empty".to_string(),
        });
    } else if name.contains(['/', '\\']) || name == "." || name == ".." {
        errors.push(ConfigError::Validation {
            message: format!(
                "storage.database_name `{name}` must be a plain file stem, not a path"
            ),
        });
    }

    if storage.drain_poll_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "storage.drain_poll_interval_ms must be at least 1".to_string(),
        });
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = TempoConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_data_dir_fails_validation() {
        let mut config = TempoConfig::default();
        config.storage.data_dir = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "data_dir"));
    }

    #[test]
    fn database_name_with_separator_fails_validation() {
        let mut config = TempoConfig::default();
        config.storage.database_name = "../client".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "plain file stem"));
    }

    #[test]
    fn zero_poll_interval_fails_validation() {
        let mut config = TempoConfig::default();
        config.storage.drain_poll_interval_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "drain_poll_interval_ms"));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = TempoConfig::default();
        config.logging.level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "logging.level"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = TempoConfig::default();
        config.storage.data_dir = String::new();
        config.storage.database_name = String::new();
        config.storage.drain_poll_interval_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn uppercase_log_level_is_accepted() {
        let mut config = TempoConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }
}

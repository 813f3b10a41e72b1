// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tempo configuration system.

use std::path::Path;

use figment::Jail;
use miette::Diagnostic;
use tempo_config::diagnostic::ConfigError;
use tempo_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tempo_config() {
    let toml = r#"
[storage]
data_dir = "/tmp/tempo-test"
database_name = "client-dev"
wal_mode = false
busy_timeout_ms = 250
drain_poll_interval_ms = 10

[logging]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.storage.data_dir, "/tmp/tempo-test");
    assert_eq!(config.storage.database_name, "client-dev");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 250);
    assert_eq!(config.storage.drain_poll_interval_ms, 10);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.storage.database_path(),
        Path::new("/tmp/tempo-test/client-dev.db")
    );
}

/// Partial sections fall back to defaults for missing keys.
#[test]
fn partial_storage_section_keeps_defaults() {
    let toml = r#"
[storage]
database_name = "other"
"#;
    let config = load_config_from_str(toml).expect("partial TOML should deserialize");
    assert_eq!(config.storage.database_name, "other");
    assert!(config.storage.wal_mode);
    assert_eq!(config.storage.drain_poll_interval_ms, 50);
}

/// Unknown field in [storage] produces an unknown-key diagnostic with a suggestion.
#[test]
fn unknown_field_in_storage_suggests_correction() {
    let toml = r#"
[storage]
wal_mod = true
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } if key == "wal_mod" => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("wal_mode"));
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[gameplay]
skin = "default"
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown section");
    assert!(
        err.to_string().contains("gameplay"),
        "error should mention the section, got: {err}"
    );
}

/// A wrongly typed value produces an InvalidType diagnostic.
#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[storage]
busy_timeout_ms = "soon"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject wrong type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("busy_timeout_ms"))),
        "expected InvalidType for busy_timeout_ms, got: {errors:?}"
    );
}

/// Validation errors surface through load_and_validate_str.
#[test]
fn validation_catches_bad_database_name() {
    let toml = r#"
[storage]
database_name = "nested/client"
"#;
    let errors = load_and_validate_str(toml).expect_err("path-like name should fail");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("database_name"))
    }));
}

/// Environment variables override file values, with underscore-containing keys mapped correctly.
#[test]
fn env_vars_override_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "tempo.toml",
            r#"
[storage]
database_name = "from-file"
drain_poll_interval_ms = 20
"#,
        )?;
        jail.set_env("TEMPO_STORAGE_DATABASE_NAME", "from-env");
        jail.set_env("TEMPO_LOGGING_LEVEL", "warn");

        let config = load_config_from_path(Path::new("tempo.toml"))?;
        assert_eq!(config.storage.database_name, "from-env");
        assert_eq!(config.storage.drain_poll_interval_ms, 20);
        assert_eq!(config.logging.level, "warn");
        Ok(())
    });
}

/// `TEMPO_STORAGE_DATA_DIR` lands in `storage.data_dir` through the full loader.
#[test]
fn env_data_dir_maps_into_storage_section() {
    Jail::expect_with(|jail| {
        jail.set_env("TEMPO_STORAGE_DATA_DIR", "/srv/tempo");
        jail.set_env("TEMPO_STORAGE_BUSY_TIMEOUT_MS", "250");

        let config = tempo_config::load_and_validate().expect("env overrides should validate");
        assert_eq!(config.storage.data_dir, "/srv/tempo");
        assert_eq!(config.storage.busy_timeout_ms, 250);
        Ok(())
    });
}

/// Unknown keys in a config file are reported with a suggestion and, when resolvable, a span.
#[test]
fn unknown_key_in_file_has_source_span() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "tempo.toml",
            "[storage]\ndata_dri = \"/tmp/x\"\n",
        )?;

        let errors = load_and_validate_path(Path::new("tempo.toml"))
            .expect_err("unknown key should fail");
        let (suggestion, span) = errors
            .iter()
            .find_map(|e| match e {
                ConfigError::UnknownKey {
                    key,
                    suggestion,
                    span,
                    ..
                } if key == "data_dri" => Some((suggestion.clone(), *span)),
                _ => None,
            })
            .expect("unknown key diagnostic");
        assert_eq!(suggestion.as_deref(), Some("data_dir"));
        // Span resolution depends on figment attaching file metadata.
        if let Some(span) = span {
            assert_eq!(span.offset(), "[storage]\n".len());
            assert_eq!(span.len(), "data_dri".len());
        }
        Ok(())
    });
}

/// ConfigError implements miette Diagnostic with code and help.
#[test]
fn config_error_is_a_diagnostic() {
    let error = ConfigError::UnknownKey {
        key: "levl".to_string(),
        suggestion: Some("level".to_string()),
        valid_keys: "level".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().expect("should have help text").to_string();
    assert!(
        help.contains("did you mean `level`"),
        "help should contain suggestion, got: {help}"
    );
}

/// ConfigError can be rendered using miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::MissingKey {
        key: "storage.data_dir".to_string(),
    };
    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("storage.data_dir"));
}

/// Defaults validate with no config files present.
#[test]
fn load_and_validate_defaults() {
    Jail::expect_with(|_jail| {
        let config = tempo_config::load_and_validate().expect("defaults should validate");
        assert_eq!(config.storage.database_name, "client");
        assert_eq!(config.logging.level, "info");
        Ok(())
    });
}

//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "tests"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Configuration loading tests."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use tiergate_common::config::AppConfig;
use tiergate_common::logging::{init_tracing, LogFormat};
use tiergate_common::LoggingConfig;

#[test]
fn first_existing_candidate_wins() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("tiergate.toml");
    fs::write(
        &present,
        r#"
bundle = "policy.toml"

[access]
super_admin_roles = ["Root"]

[cache]
default_ttl = 60
"#,
    )
    .unwrap();

    let loaded = AppConfig::load_with_source(&[missing, present.clone()]).unwrap();
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.cache.default_ttl, Duration::from_secs(60));
    assert!(loaded.config.access.is_super_admin_name("Root"));
    assert!(!loaded.config.access.is_super_admin_name("Super Administrator"));
    assert_eq!(
        loaded.config.bundle.as_deref(),
        Some(std::path::Path::new("policy.toml"))
    );
}

#[test]
fn no_candidates_reports_inspected_paths() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = AppConfig::load(&[missing]).unwrap_err();
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[cache]\ncapacity = 0\n").unwrap();
    let err = AppConfig::from_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("capacity"));
}

#[test]
fn tracing_initialises_into_directory() {
    let dir = tempdir().unwrap();
    let config = LoggingConfig {
        directory: dir.path().join("logs"),
        format: LogFormat::Pretty,
        file_prefix: Some("test".into()),
    };
    init_tracing("tiergate-test", &config).unwrap();
    assert!(config.directory.is_dir());
}

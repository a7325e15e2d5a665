//! Configuration loading and precedence tests

use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tinyai_config::{ConfigError, ConfigLoader, FormatSpec, ProjectConfig, TargetKindSpec};

fn create_config_file(dir: &Path, content: &str) -> std::path::PathBuf {
    let config_path = dir.join("tinyai.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(!config.is_project());
    assert_eq!(config.package_name(), None);
    assert!(config.project.targets.is_empty());
    assert_eq!(config.library_name(), "TinyAiApi");
}

#[test]
fn test_tinyai_toml_package_wins_over_package_json() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[package]
name = "from-toml"
version = "1.0.0"
"#,
    );
    fs::write(
        temp_dir.path().join("package.json"),
        r#"{ "name": "from-json", "version": "9.9.9" }"#,
    )
    .unwrap();

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert_eq!(config.package_name(), Some("from-toml"));
    assert_eq!(config.library_name(), "FromToml");
}

#[test]
fn test_custom_source_and_output_dirs() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[build]
source = "lib"
output = "out/pkg"
"#,
    );

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert_eq!(config.source_dir(), temp_dir.path().join("lib"));
    assert_eq!(config.output_dir(), temp_dir.path().join("out/pkg"));
}

#[test]
fn test_targets_parse_in_order() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[[target]]
name = "esm"
kind = "modules"
format = "esm"
out_extension = "mjs"

[[target]]
name = "browser"
kind = "bundle"
entry = "src/index.mjs"
library = "TinyAiApi"
library_export = "TinyAiApi"
emit_unminified = true
"#,
    );

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap();

    let names: Vec<_> = config.project.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["esm", "browser"]);
    assert_eq!(config.project.targets[0].format, Some(FormatSpec::Esm));
    assert_eq!(config.project.targets[1].kind, TargetKindSpec::Bundle);
    assert_eq!(config.project.targets[1].emit_unminified, Some(true));
}

// ============================================================================
// Validation Tests
// ============================================================================

#[rstest]
#[case("[package]\nname = \"\"\nversion = \"1.0.0\"\n")]
#[case("[package]\nname = \"x\"\nversion = \"latest\"\n")]
#[case("[build]\ndialect = \"ts\"\n")]
#[case("[tools]\nminify = \"   \"\n")]
fn test_invalid_configs_rejected(#[case] content: &str) {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), content);

    let result = ProjectConfig::load_from_file(&path);
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_toml_syntax_error_reports_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[build\nsource = ");

    match ProjectConfig::load_from_file(&path) {
        Err(ConfigError::TomlParseError { file, .. }) => assert_eq!(file, path),
        other => panic!("expected TOML parse error, got {:?}", other),
    }
}

#[test]
fn test_missing_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tinyai.toml");
    assert!(matches!(
        ProjectConfig::load_from_file(&path),
        Err(ConfigError::NotFound(_))
    ));
}

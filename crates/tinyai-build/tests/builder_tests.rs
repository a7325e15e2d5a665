//! Integration tests for the builder
//!
//! Tests the complete pipeline with real projects configured by
//! tinyai.toml and package.json

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tinyai_build::{
    BuildError, BuildSummary, Builder, OutputMode, Profile, SourceDialect, TargetKind,
};

const PACKAGE_JSON: &str = r#"{
  "name": "tiny-ai-api",
  "version": "1.0.0",
  "dependencies": { "axios": "^1.6.0" }
}"#;

/// Create a test project with the given structure
fn create_test_project(manifest: &str, files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    fs::write(path.join("tinyai.toml"), manifest).unwrap();
    fs::write(path.join("package.json"), PACKAGE_JSON).unwrap();

    for (file_path, content) in files {
        let full_path = path.join(file_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full_path, content).unwrap();
    }

    dir
}

fn client_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "src/index.mjs",
            "import { objType } from './util/types.mjs';\nexport { objType };\n\
             export default { objType };\n",
        ),
        (
            "src/util/types.mjs",
            "export function objType(value) {\n  \
             return Object.prototype.toString.call(value).slice(8, -1);\n}\n",
        ),
        ("src/http.mjs", "import axios from 'axios';\nexport const client = axios.create();\n"),
    ]
}

fn dist_files(root: &Path) -> Vec<PathBuf> {
    let dist = root.join("dist");
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&dist)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(&dist).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

#[test]
fn test_default_targets_release() {
    let project = create_test_project("", &client_sources());

    let context = Builder::new(project.path()).unwrap().build().unwrap();

    assert!(context.is_success(), "{:?}", context.report.failures);
    assert_eq!(context.profile.name, "release");
    assert_eq!(context.stats.source_files, 3);
    assert_eq!(context.stats.targets_built, 2);
    assert_eq!(context.stats.targets_failed, 0);
    assert_eq!(
        dist_files(project.path()),
        vec![
            PathBuf::from("TinyAiApi.min.js"),
            PathBuf::from("http.cjs"),
            PathBuf::from("index.cjs"),
            PathBuf::from("util/types.cjs"),
        ]
    );

    let http = fs::read_to_string(project.path().join("dist/http.cjs")).unwrap();
    assert!(http.contains("require('axios')"));
}

#[test]
fn test_dev_profile_emits_readable_bundle() {
    let project = create_test_project("", &client_sources());

    let context = Builder::new(project.path())
        .unwrap()
        .with_profile(Profile::Dev)
        .build()
        .unwrap();

    assert!(context.is_success());
    let files = dist_files(project.path());
    assert!(files.contains(&PathBuf::from("TinyAiApi.js")));
    assert!(!files.contains(&PathBuf::from("TinyAiApi.min.js")));
}

#[test]
fn test_declared_targets_and_profile_from_manifest() {
    let manifest = r#"
[build]
profile = "bench"

[[target]]
name = "esm"
kind = "modules"
format = "esm"
out_dir = "dist/esm"

[[target]]
name = "browser"
kind = "bundle"
entry = "src/index.mjs"
library = "Tiny"

[profile.bench]
inherits = "release"
minify = false
"#;
    let project = create_test_project(manifest, &client_sources());
    let builder = Builder::new(project.path()).unwrap();

    let targets = builder.targets().unwrap();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].kind, TargetKind::Modules);
    assert_eq!(targets[1].bundle_filename(), "Tiny.js");

    let context = builder.build().unwrap();
    assert!(context.is_success(), "{:?}", context.report.failures);
    assert_eq!(context.profile.name, "bench");
    assert_eq!(
        dist_files(project.path()),
        vec![
            PathBuf::from("Tiny.js"),
            PathBuf::from("esm/http.mjs"),
            PathBuf::from("esm/index.mjs"),
            PathBuf::from("esm/util/types.mjs"),
        ]
    );
}

#[test]
fn test_target_filter() {
    let project = create_test_project("", &client_sources());

    let context = Builder::new(project.path())
        .unwrap()
        .with_target_filter(vec!["browser".to_string()])
        .build()
        .unwrap();

    assert_eq!(context.report.built, vec!["browser".to_string()]);
    assert_eq!(dist_files(project.path()), vec![PathBuf::from("TinyAiApi.min.js")]);
}

#[test]
fn test_unknown_target_filter_is_rejected() {
    let project = create_test_project("", &client_sources());

    let result = Builder::new(project.path())
        .unwrap()
        .with_target_filter(vec!["umd".to_string()])
        .build();

    assert!(matches!(result, Err(BuildError::InvalidTarget(_))));
}

#[test]
fn test_js_dialect_from_manifest() {
    let manifest = r#"
[build]
dialect = "js"
"#;
    let project = create_test_project(
        manifest,
        &[
            ("src/index.js", "export const x = 1;\n"),
            ("src/ignored.mjs", "export const y = 2;\n"),
        ],
    );
    let builder = Builder::new(project.path()).unwrap();
    assert_eq!(builder.dialect().unwrap(), SourceDialect::Js);

    let context = builder.build().unwrap();
    assert!(context.is_success(), "{:?}", context.report.failures);
    assert_eq!(context.stats.source_files, 1);
    assert!(project.path().join("dist/index.cjs").exists());
    assert!(!project.path().join("dist/ignored.cjs").exists());
}

#[test]
fn test_missing_source_dir_aborts_build() {
    let project = create_test_project("", &[]);

    let result = Builder::new(project.path()).unwrap().build();

    assert!(matches!(result, Err(BuildError::Discovery { .. })));
}

#[test]
fn test_missing_entry_fails_only_bundle() {
    let project = create_test_project("", &[("src/lib.mjs", "export const lib = 1;\n")]);

    let context = Builder::new(project.path()).unwrap().build().unwrap();

    assert!(!context.is_success());
    assert_eq!(context.report.built, vec!["cjs".to_string()]);
    assert!(matches!(
        context.report.failure("browser"),
        Some(BuildError::MissingEntry { .. })
    ));
    assert_eq!(dist_files(project.path()), vec![PathBuf::from("lib.cjs")]);
}

#[test]
fn test_output_dir_override_and_clean() {
    let project = create_test_project("", &client_sources());
    let out = project.path().join("build-out");

    let builder = Builder::new(project.path())
        .unwrap()
        .with_output_dir(&out)
        .with_output_mode(OutputMode::Quiet);
    assert_eq!(builder.output_mode(), OutputMode::Quiet);

    let context = builder.build().unwrap();
    assert!(context.is_success());
    assert!(out.join("index.cjs").exists());
    assert!(!project.path().join("dist").exists());

    let removed = builder.clean().unwrap();
    assert_eq!(removed, vec![out.clone()]);
    assert!(!out.exists());
    assert!(builder.clean().unwrap().is_empty());
}

#[test]
fn test_summary_lists_every_target() {
    let project = create_test_project("", &[("src/lib.mjs", "export const lib = 1;\n")]);
    let context = Builder::new(project.path()).unwrap().build().unwrap();

    let summary = BuildSummary::from_context(&context);
    assert!(!summary.success);
    assert_eq!(summary.source_files, 1);
    let names: Vec<&str> = summary.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["cjs", "browser"]);
    assert!(summary.targets[1].error.is_some());

    let json: serde_json::Value = serde_json::from_str(&summary.to_json()).unwrap();
    assert_eq!(json["targets"][0]["artifacts"][0]["modules"], 1);
}

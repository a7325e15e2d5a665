//! Target planning
//!
//! Turns the `[[target]]` tables of a loaded configuration (or the default
//! pair of targets when there are none) into validated [`BuildTarget`]s.

use crate::discovery::SourceDialect;
use crate::error::{BuildError, BuildResult};
use crate::profile::ProfileConfig;
use crate::targets::{BuildTarget, OutputFormat, TargetKind};
use crate::transform::{ChainFlags, TransformChain, TransformStep};
use tinyai_config::{Config, FormatSpec, TargetConfig, TargetKindSpec};

/// Name of the default module-preserving target
pub const DEFAULT_MODULES_TARGET: &str = "cjs";

/// Name of the default browser bundle
pub const DEFAULT_BUNDLE_TARGET: &str = "browser";

/// Plan every target the configuration declares
pub fn plan_targets(
    config: &Config,
    profile: &ProfileConfig,
    dialect: &SourceDialect,
) -> BuildResult<Vec<BuildTarget>> {
    for step in config.project.tools.keys() {
        if TransformStep::builtin(step).is_none() {
            return Err(BuildError::InvalidTarget(format!(
                "[tools] names unknown step '{}'",
                step
            )));
        }
    }

    let targets = if config.project.targets.is_empty() {
        default_targets(config, profile, dialect)
    } else {
        config
            .project
            .targets
            .iter()
            .map(|spec| plan_target(config, profile, spec))
            .collect::<BuildResult<Vec<_>>>()?
    };

    for target in &targets {
        target.validate().map_err(BuildError::InvalidTarget)?;
    }

    Ok(targets)
}

fn default_targets(
    config: &Config,
    profile: &ProfileConfig,
    dialect: &SourceDialect,
) -> Vec<BuildTarget> {
    let tools = &config.project.tools;
    let output_dir = config.output_dir();

    let modules = BuildTarget::modules(DEFAULT_MODULES_TARGET, OutputFormat::CommonJs, &output_dir)
        .with_externals(config.externals())
        .with_transforms(
            TransformChain::for_target(TargetKind::Modules, true, ChainFlags::default())
                .with_tools(tools),
        );

    let entry = config
        .source_dir()
        .join(format!("index{}", dialect.extension()));
    let bundle = BuildTarget::bundle(
        DEFAULT_BUNDLE_TARGET,
        entry,
        config.library_name(),
        &output_dir,
    )
    .with_emit_unminified(profile.emit_unminified)
    .with_transforms(
        TransformChain::for_target(TargetKind::Bundle, false, profile_flags(profile))
            .with_tools(tools),
    );

    vec![modules, bundle]
}

fn profile_flags(profile: &ProfileConfig) -> ChainFlags {
    ChainFlags {
        downlevel: profile.downlevel,
        polyfill: profile.polyfill,
        minify: profile.minify,
    }
}

fn plan_target(
    config: &Config,
    profile: &ProfileConfig,
    spec: &TargetConfig,
) -> BuildResult<BuildTarget> {
    let root = config.root_dir();
    let out_dir = spec
        .out_dir
        .as_ref()
        .map(|dir| root.join(dir))
        .unwrap_or_else(|| config.output_dir());

    let target = match spec.kind {
        TargetKindSpec::Modules => {
            let format = match spec.format.unwrap_or(FormatSpec::Cjs) {
                FormatSpec::Cjs => OutputFormat::CommonJs,
                FormatSpec::Esm => OutputFormat::Esm,
                FormatSpec::Global => OutputFormat::Global,
            };
            if spec.entry.is_some() {
                return Err(BuildError::InvalidTarget(format!(
                    "modules target '{}' takes every source; remove `entry`",
                    spec.name
                )));
            }
            for (step, flag) in [
                ("minify", spec.minify),
                ("downlevel", spec.downlevel),
                ("polyfill", spec.polyfill),
            ] {
                if flag == Some(true) {
                    return Err(BuildError::InvalidTarget(format!(
                        "modules target '{}' cannot enable {}",
                        spec.name, step
                    )));
                }
            }

            let mut externals = config.externals();
            for name in &spec.externals {
                if !externals.contains(name) {
                    externals.push(name.clone());
                }
            }

            let mut target = BuildTarget::modules(&spec.name, format, out_dir)
                .with_externals(externals)
                .with_globals(spec.globals.clone())
                .with_transforms(
                    TransformChain::for_target(
                        TargetKind::Modules,
                        format == OutputFormat::CommonJs,
                        ChainFlags::default(),
                    )
                    .with_tools(&config.project.tools),
                );
            if let Some(extension) = &spec.out_extension {
                target = target.with_out_extension(extension);
            }
            target
        }
        TargetKindSpec::Bundle => {
            if let Some(format) = spec.format {
                if format != FormatSpec::Global {
                    return Err(BuildError::InvalidTarget(format!(
                        "bundle target '{}' only emits global scripts",
                        spec.name
                    )));
                }
            }
            let entry = match &spec.entry {
                Some(entry) => root.join(entry),
                None => {
                    return Err(BuildError::InvalidTarget(format!(
                        "bundle target '{}' needs an `entry`",
                        spec.name
                    )))
                }
            };
            let flags = ChainFlags {
                downlevel: spec.downlevel.unwrap_or(profile.downlevel),
                polyfill: spec.polyfill.unwrap_or(profile.polyfill),
                minify: spec.minify.unwrap_or(profile.minify),
            };
            let library = spec.library.clone().unwrap_or_else(|| config.library_name());

            let mut target = BuildTarget::bundle(&spec.name, entry, library, out_dir)
                .with_externals(spec.externals.clone())
                .with_globals(spec.globals.clone())
                .with_emit_unminified(spec.emit_unminified.unwrap_or(profile.emit_unminified))
                .with_transforms(
                    TransformChain::for_target(TargetKind::Bundle, false, flags)
                        .with_tools(&config.project.tools),
                );
            if let Some(filename) = &spec.filename {
                target = target.with_filename(filename);
            }
            if let Some(export) = &spec.library_export {
                target = target.with_library_export(export);
            }
            target
        }
    };

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::targets::EntrySpec;
    use std::path::{Path, PathBuf};
    use tinyai_config::{PackageJson, ProjectConfig};

    fn config(toml_src: &str) -> Config {
        let project: ProjectConfig = toml::from_str(toml_src).unwrap();
        Config {
            project,
            package: None,
            project_root: Some(PathBuf::from("/p")),
            base_dir: PathBuf::from("/p"),
        }
    }

    fn plan_release(config: &Config) -> BuildResult<Vec<BuildTarget>> {
        plan_targets(config, &Profile::Release.default_config(), &SourceDialect::Mjs)
    }

    #[test]
    fn test_default_targets() {
        let mut config = config("");
        config.package = Some(PackageJson {
            name: Some("tiny-ai-api".to_string()),
            dependencies: [("axios".to_string(), "^1".to_string())].into_iter().collect(),
            ..Default::default()
        });
        let release = Profile::Release.default_config();

        let targets = plan_targets(&config, &release, &SourceDialect::Mjs).unwrap();
        assert_eq!(targets.len(), 2);

        let cjs = &targets[0];
        assert_eq!(cjs.name, "cjs");
        assert_eq!(cjs.out_dir, Path::new("/p/dist"));
        assert_eq!(cjs.externals, vec!["axios".to_string()]);

        let browser = &targets[1];
        assert_eq!(browser.entry, EntrySpec::File(PathBuf::from("/p/src/index.mjs")));
        assert_eq!(browser.library_name(), "TinyAiApi");
        assert_eq!(browser.bundle_filename(), "TinyAiApi.min.js");
    }

    #[test]
    fn test_dev_profile_bundle_is_readable() {
        let dev = Profile::Dev.default_config();
        let targets = plan_targets(&config(""), &dev, &SourceDialect::Js).unwrap();
        let browser = &targets[1];
        assert!(!browser.transforms.contains("minify"));
        assert!(!browser.transforms.contains("downlevel"));
        assert_eq!(browser.entry, EntrySpec::File(PathBuf::from("/p/src/index.js")));
    }

    #[test]
    fn test_declared_targets() {
        let config = config(
            r#"
[[target]]
name = "esm"
kind = "modules"
format = "esm"
out_dir = "dist/esm"

[[target]]
name = "browser"
kind = "bundle"
entry = "src/main.mjs"
library = "Tiny"
minify = false
globals = { lodash = "_" }

[tools]
minify = "npx terser"
"#,
        );
        let targets = plan_release(&config).unwrap();

        assert_eq!(targets[0].out_dir, Path::new("/p/dist/esm"));
        assert_eq!(targets[0].out_extension, "mjs");
        assert_eq!(targets[1].bundle_filename(), "Tiny.js");
        assert_eq!(targets[1].globals.get("lodash").map(String::as_str), Some("_"));
        assert!(targets[1].transforms.contains("downlevel"));
    }

    #[test]
    fn test_tools_replace_steps() {
        let config = config(
            r#"
[tools]
minify = "npx terser"
"#,
        );
        let targets = plan_release(&config).unwrap();
        assert!(targets[1].transforms.steps().contains(&TransformStep::External {
            step: "minify".to_string(),
            command: "npx terser".to_string(),
        }));
    }

    #[test]
    fn test_rejects_unknown_tool_step() {
        let config = config(
            r#"
[tools]
typecheck = "tsc"
"#,
        );
        assert!(matches!(
            plan_release(&config),
            Err(BuildError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_rejects_minified_modules_target() {
        let config = config(
            r#"
[[target]]
name = "cjs"
kind = "modules"
minify = true
"#,
        );
        assert!(plan_release(&config).is_err());
    }

    #[test]
    fn test_rejects_bundle_without_entry() {
        let config = config(
            r#"
[[target]]
name = "browser"
kind = "bundle"
"#,
        );
        assert!(plan_release(&config).is_err());
    }
}

//! Project Configuration (tinyai.toml)
//!
//! Handles project-level configuration stored in `tinyai.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Project configuration from tinyai.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Package metadata (falls back to package.json when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageConfig>,

    /// Build configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,

    /// Output targets; the built-in pair is used when empty
    #[serde(default, rename = "target")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetConfig>,

    /// Profile overrides and custom profiles, keyed by profile name
    #[serde(default, rename = "profile")]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub profiles: HashMap<String, ProfileOverrides>,

    /// External commands replacing built-in transform steps, keyed by step name
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, String>,
}

/// Package metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Package name
    pub name: String,

    /// Package version (semver)
    pub version: String,

    /// Package description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Source directory scanned for modules (default: "src")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Output directory (default: "dist")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Source dialect: "mjs", "js" or an explicit ".suffix" (default: "mjs")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,

    /// Default build profile (default: "release")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Extra bare specifiers kept external by module-preserving targets
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<String>,
}

/// Target kind as written in tinyai.toml
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetKindSpec {
    /// One output file per source file
    Modules,
    /// One self-contained output file
    Bundle,
}

/// Output format as written in tinyai.toml
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormatSpec {
    Cjs,
    Esm,
    Global,
}

/// `[[target]]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Target name
    pub name: String,

    pub kind: TargetKindSpec,

    /// Output format; defaults to "cjs" for modules and "global" for bundles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatSpec>,

    /// Entry file for bundles, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<PathBuf>,

    /// Output directory override, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,

    /// Output extension for module targets (e.g. "cjs")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_extension: Option<String>,

    /// Output file name for bundles (default: "<library>.min.js")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Global name the bundle is exposed under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Export of the entry module assigned to the global instead of the whole namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_export: Option<String>,

    /// Bare specifiers left external (module targets)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<String>,

    /// Bare specifier -> pre-existing global alias (bundles)
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub globals: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlevel: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub polyfill: Option<bool>,

    /// Also write the non-minified bundle next to the minified one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_unminified: Option<bool>,
}

/// `[profile.<name>]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverrides {
    /// Built-in profile to start from (custom profiles only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_unminified: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlevel: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub polyfill: Option<bool>,

    /// Run independent targets in parallel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(pkg) = &self.package {
            if pkg.name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "package.name".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }

            if !is_valid_version(&pkg.version) {
                return Err(ConfigError::InvalidValue {
                    field: "package.version".to_string(),
                    reason: format!("invalid version '{}'", pkg.version),
                });
            }
        }

        if let Some(dialect) = self.build.as_ref().and_then(|b| b.dialect.as_deref()) {
            validate_dialect(dialect)?;
        }

        let mut seen = std::collections::HashSet::new();
        for target in &self.targets {
            if target.name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "target.name".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate target '{}'",
                    target.name
                )));
            }
        }

        for (step, command) in &self.tools {
            if command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("tools.{}", step),
                    reason: "command cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the package name, if present
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.name.as_str())
    }

    /// Get the package version, if present
    pub fn package_version(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.version.as_str())
    }

    /// Get the configured dialect, if present
    pub fn dialect(&self) -> Option<&str> {
        self.build.as_ref().and_then(|b| b.dialect.as_deref())
    }

    /// Get the configured default profile, if present
    pub fn profile(&self) -> Option<&str> {
        self.build.as_ref().and_then(|b| b.profile.as_deref())
    }

    /// Mutable access to the `[build]` section, creating it if absent
    pub fn build_mut(&mut self) -> &mut BuildSection {
        self.build.get_or_insert_with(BuildSection::default)
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if other.package.is_some() {
            self.package = other.package.clone();
        }
        if other.build.is_some() {
            self.build = other.build.clone();
        }
        if !other.targets.is_empty() {
            self.targets = other.targets.clone();
        }
        if !other.profiles.is_empty() {
            self.profiles.extend(other.profiles.clone());
        }
        if !other.tools.is_empty() {
            self.tools.extend(other.tools.clone());
        }
    }
}

/// Basic semver validation (simplified)
fn is_valid_version(version: &str) -> bool {
    let main_version = version.split(['-', '+']).next().unwrap_or("");
    if main_version.is_empty() {
        return false;
    }

    // Main version should be X.Y or X.Y.Z where X, Y, Z are digits
    let parts: Vec<&str> = main_version.split('.').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return false;
    }

    parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// A dialect is a known short name or a dotted suffix
pub(crate) fn validate_dialect(dialect: &str) -> ConfigResult<()> {
    let ok = matches!(dialect, "mjs" | "js")
        || (dialect.len() > 1 && dialect.starts_with('.') && !dialect.contains('/'));
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "build.dialect".to_string(),
            reason: format!("expected \"mjs\", \"js\" or a \".suffix\", got '{}'", dialect),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_project_config() {
        let toml = r#"
[package]
name = "tiny-ai-api"
version = "0.1.0"
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.package_name(), Some("tiny-ai-api"));
        assert_eq!(config.package_version(), Some("0.1.0"));
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_parse_full_project_config() {
        let toml = r#"
[package]
name = "tiny-ai-api"
version = "1.0.0"

[build]
source = "src"
output = "dist"
dialect = "mjs"
profile = "dev"
externals = ["lodash"]

[[target]]
name = "cjs"
kind = "modules"
format = "cjs"
out_extension = "cjs"

[[target]]
name = "browser"
kind = "bundle"
entry = "src/index.mjs"
library = "TinyAiApi"
globals = { lodash = "_" }
minify = true

[profile.bench]
inherits = "release"
minify = false

[tools]
minify = "npx terser"
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.dialect(), Some("mjs"));
        assert_eq!(config.profile(), Some("dev"));
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].kind, TargetKindSpec::Modules);
        assert_eq!(config.targets[0].format, Some(FormatSpec::Cjs));
        assert_eq!(config.targets[1].globals.get("lodash"), Some(&"_".to_string()));
        assert_eq!(config.profiles["bench"].inherits.as_deref(), Some("release"));
        assert_eq!(config.tools.get("minify").map(String::as_str), Some("npx terser"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[build]
sauce = "src"
"#;
        assert!(toml::from_str::<ProjectConfig>(toml).is_err());
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let toml = r#"
[[target]]
name = "cjs"
kind = "modules"

[[target]]
name = "cjs"
kind = "bundle"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_version_validation() {
        assert!(is_valid_version("1.0.0"));
        assert!(is_valid_version("1.0"));
        assert!(is_valid_version("1.0.0-beta.1"));
        assert!(!is_valid_version(""));
        assert!(!is_valid_version("1"));
        assert!(!is_valid_version("one.two"));
    }

    #[test]
    fn test_dialect_validation() {
        assert!(validate_dialect("mjs").is_ok());
        assert!(validate_dialect("js").is_ok());
        assert!(validate_dialect(".jsx").is_ok());
        assert!(validate_dialect("ts").is_err());
        assert!(validate_dialect(".").is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = ProjectConfig::default();
        let override_config = ProjectConfig {
            package: Some(PackageConfig {
                name: "override".to_string(),
                version: "2.0.0".to_string(),
                description: None,
            }),
            ..Default::default()
        };

        base.merge(&override_config);
        assert_eq!(base.package_name(), Some("override"));
    }
}

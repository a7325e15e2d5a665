//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::package_json::PackageJson;
use crate::project::{validate_dialect, ProjectConfig};
use crate::{ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Project config (./tinyai.toml) - lowest priority
/// 2. package.json next to it - fills in package metadata and dependencies
/// 3. Environment variables (TINYAI_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip TINYAI_* environment overrides
    ignore_env: bool,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// package.json metadata, when the project has one
    pub package: Option<PackageJson>,

    /// Directory where tinyai.toml was found
    pub project_root: Option<PathBuf>,

    /// Directory the search started from
    pub base_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { ignore_env: false }
    }

    /// Disable environment variable overrides
    pub fn without_env(mut self) -> Self {
        self.ignore_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find tinyai.toml. A directory without
    /// one still loads: defaults apply and package.json is read from `start_dir`.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let root = project_root.clone().unwrap_or_else(|| start_dir.to_path_buf());
        self.finish(project_config, project_root, root)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let project_root = config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        self.finish(project_config, Some(project_root.clone()), project_root)
    }

    fn finish(
        &self,
        project: ProjectConfig,
        project_root: Option<PathBuf>,
        base_dir: PathBuf,
    ) -> ConfigResult<Config> {
        let package_path = base_dir.join("package.json");
        let package = if package_path.exists() {
            Some(PackageJson::load_from_file(&package_path)?)
        } else {
            None
        };

        let project = if self.ignore_env {
            project
        } else {
            self.apply_env_overrides(project)?
        };

        Ok(Config {
            project,
            package,
            project_root,
            base_dir,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); the default config when none is found
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognized: TINYAI_PROFILE, TINYAI_DIALECT, TINYAI_OUTPUT
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(profile) = env::var("TINYAI_PROFILE") {
            config.build_mut().profile = Some(profile);
        }

        if let Ok(dialect) = env::var("TINYAI_DIALECT") {
            validate_dialect(&dialect)?;
            config.build_mut().dialect = Some(dialect);
        }

        if let Ok(output) = env::var("TINYAI_OUTPUT") {
            config.build_mut().output = Some(PathBuf::from(output));
        }

        Ok(config)
    }
}

impl Config {
    /// Directory every relative path in the configuration is resolved against
    pub fn root_dir(&self) -> &Path {
        self.project_root.as_deref().unwrap_or(&self.base_dir)
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Package name from tinyai.toml, falling back to package.json
    pub fn package_name(&self) -> Option<&str> {
        self.project
            .package_name()
            .or_else(|| self.package.as_ref().and_then(|p| p.name.as_deref()))
    }

    /// Check if this is a project (has tinyai.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Source directory (default: `<root>/src`)
    pub fn source_dir(&self) -> PathBuf {
        let source = self
            .project
            .build
            .as_ref()
            .and_then(|b| b.source.clone())
            .unwrap_or_else(|| PathBuf::from("src"));
        self.root_dir().join(source)
    }

    /// Output directory (default: `<root>/dist`)
    pub fn output_dir(&self) -> PathBuf {
        let output = self
            .project
            .build
            .as_ref()
            .and_then(|b| b.output.clone())
            .unwrap_or_else(|| PathBuf::from("dist"));
        self.root_dir().join(output)
    }

    /// Runtime dependencies declared in package.json plus configured externals
    pub fn externals(&self) -> Vec<String> {
        let mut externals = self
            .package
            .as_ref()
            .map(|p| p.runtime_dependencies())
            .unwrap_or_default();
        if let Some(build) = &self.project.build {
            for name in &build.externals {
                if !externals.contains(name) {
                    externals.push(name.clone());
                }
            }
        }
        externals
    }

    /// Global name for bundles that do not set `library`
    pub fn library_name(&self) -> String {
        match self.project.package_name() {
            Some(name) => PackageJson {
                name: Some(name.to_string()),
                ..Default::default()
            }
            .library_name(),
            None => self.package.clone().unwrap_or_default().library_name(),
        }
    }
}

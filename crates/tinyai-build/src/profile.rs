//! Build profile management
//!
//! Provides packaging profiles (dev, release, custom) that decide which
//! optional transform steps bundles run and whether targets build in
//! parallel.

use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tinyai_config::ProfileOverrides;

/// Build profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Readable bundles for local work
    Dev,
    /// Minified, downleveled, polyfilled bundles (default)
    Release,
    /// Custom profile
    Custom(String),
}

impl Profile {
    /// Parse profile from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> BuildResult<Self> {
        match s.to_lowercase().as_str() {
            "" => Err(BuildError::ProfileNotFound(String::new())),
            "dev" => Ok(Self::Dev),
            "release" => Ok(Self::Release),
            custom => Ok(Self::Custom(custom.to_string())),
        }
    }

    /// Get profile name
    pub fn name(&self) -> &str {
        match self {
            Self::Dev => "dev",
            Self::Release => "release",
            Self::Custom(name) => name,
        }
    }

    /// Check if this is a built-in profile
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Dev | Self::Release)
    }

    /// Get default configuration for this profile
    pub fn default_config(&self) -> ProfileConfig {
        match self {
            Self::Dev => ProfileConfig {
                name: "dev".to_string(),
                minify: false,
                emit_unminified: true,
                downlevel: false,
                polyfill: true,
                parallel: true,
            },
            Self::Release => ProfileConfig {
                name: "release".to_string(),
                minify: true,
                emit_unminified: false,
                downlevel: true,
                polyfill: true,
                parallel: true,
            },
            Self::Custom(name) => ProfileConfig {
                name: name.clone(),
                ..Self::Release.default_config()
            },
        }
    }
}

#[allow(clippy::derivable_impls)]
impl Default for Profile {
    fn default() -> Self {
        Self::Release
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Profile configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name
    pub name: String,
    /// Run the minify step on bundles
    pub minify: bool,
    /// Also write the bundle as it was before minification
    pub emit_unminified: bool,
    /// Run the downlevel step on bundled modules
    pub downlevel: bool,
    /// Run the polyfill step on bundles
    pub polyfill: bool,
    /// Build targets on the rayon pool
    pub parallel: bool,
}

impl ProfileConfig {
    /// Create from profile with defaults
    pub fn from_profile(profile: &Profile) -> Self {
        profile.default_config()
    }

    /// Merge with a `[profile.<name>]` table
    pub fn merge_with_manifest(&mut self, manifest: &ProfileOverrides) {
        if let Some(minify) = manifest.minify {
            self.minify = minify;
        }
        if let Some(emit) = manifest.emit_unminified {
            self.emit_unminified = emit;
        }
        if let Some(downlevel) = manifest.downlevel {
            self.downlevel = downlevel;
        }
        if let Some(polyfill) = manifest.polyfill {
            self.polyfill = polyfill;
        }
        if let Some(parallel) = manifest.parallel {
            self.parallel = parallel;
        }
    }

    /// Create from custom profile with inheritance
    pub fn from_custom(
        name: String,
        manifest: &ProfileOverrides,
        base_profile: Option<&Profile>,
    ) -> Self {
        let mut config = base_profile.unwrap_or(&Profile::Release).default_config();
        config.name = name;
        config.merge_with_manifest(manifest);
        config
    }
}

/// Profile manager - handles profile loading and configuration
pub struct ProfileManager {
    /// Available profiles
    profiles: HashMap<String, ProfileConfig>,
}

impl ProfileManager {
    /// Create new profile manager
    pub fn new() -> Self {
        let mut profiles = HashMap::new();

        // Register built-in profiles
        profiles.insert("dev".to_string(), Profile::Dev.default_config());
        profiles.insert("release".to_string(), Profile::Release.default_config());

        Self { profiles }
    }

    /// Load profiles from `[profile.*]` tables
    pub fn load_from_manifest(
        &mut self,
        manifest_profiles: &HashMap<String, ProfileOverrides>,
    ) -> BuildResult<()> {
        for (name, overrides) in manifest_profiles {
            let profile = Profile::from_str(name)?;
            let config = if profile.is_builtin() {
                if overrides.inherits.is_some() {
                    return Err(BuildError::InvalidTarget(format!(
                        "built-in profile '{}' cannot inherit",
                        name
                    )));
                }
                let mut config = profile.default_config();
                config.merge_with_manifest(overrides);
                config
            } else {
                let base_profile = match &overrides.inherits {
                    Some(inherits) => {
                        let base = Profile::from_str(inherits)?;
                        if !base.is_builtin() {
                            return Err(BuildError::ProfileNotFound(inherits.clone()));
                        }
                        Some(base)
                    }
                    None => None,
                };
                ProfileConfig::from_custom(name.clone(), overrides, base_profile.as_ref())
            };

            self.profiles.insert(name.clone(), config);
        }

        Ok(())
    }

    /// Get profile configuration
    pub fn get(&self, profile: &Profile) -> BuildResult<ProfileConfig> {
        let name = profile.name();
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::ProfileNotFound(name.to_string()))
    }

    /// Check if profile exists
    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// List all available profiles
    pub fn list_profiles(&self) -> Vec<String> {
        let mut names: Vec<_> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProfileManager {
    fn default() -> Self {
        Self::new()
    }
}

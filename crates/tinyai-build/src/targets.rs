/// Build target types and artifact management
use crate::discovery::SourceFileSet;
use crate::transform::{Stage, TransformChain, TransformStep};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Kind of build target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// One output file per source file, directory structure preserved
    Modules,
    /// One self-contained file for browsers
    Bundle,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Modules => write!(f, "modules"),
            Self::Bundle => write!(f, "bundle"),
        }
    }
}

/// Module format of emitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    CommonJs,
    Esm,
    /// Script assigning a global
    Global,
}

impl OutputFormat {
    /// Whether this format is valid for a target kind
    pub fn allowed_for(&self, kind: TargetKind) -> bool {
        match kind {
            TargetKind::Modules => matches!(self, Self::CommonJs | Self::Esm),
            TargetKind::Bundle => matches!(self, Self::Global),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CommonJs => write!(f, "cjs"),
            Self::Esm => write!(f, "esm"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// Which sources a target starts from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySpec {
    /// Every file of the SourceFileSet
    All,
    /// A single entry file (absolute)
    File(PathBuf),
}

/// One configured output of a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Target name
    pub name: String,
    pub kind: TargetKind,
    pub format: OutputFormat,
    pub entry: EntrySpec,
    /// Directory the target writes into
    pub out_dir: PathBuf,
    /// Extension of emitted modules, without the dot
    pub out_extension: String,
    /// Bundle file name; derived from the library name when unset
    pub filename: Option<String>,
    /// Global the bundle assigns
    pub library: Option<String>,
    /// Export of the entry module exposed instead of the whole namespace
    pub library_export: Option<String>,
    /// Bare specifiers left to the consuming environment
    pub externals: Vec<String>,
    /// Bare specifier to pre-existing global name (bundles only)
    pub globals: BTreeMap<String, String>,
    pub transforms: TransformChain,
    /// Also write the bundle before minification
    pub emit_unminified: bool,
}

impl BuildTarget {
    /// Create a module-preserving target emitting into `out_dir`
    pub fn modules(
        name: impl Into<String>,
        format: OutputFormat,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        let out_extension = match format {
            OutputFormat::Esm => "mjs",
            _ => "cjs",
        };
        Self {
            name: name.into(),
            kind: TargetKind::Modules,
            format,
            entry: EntrySpec::All,
            out_dir: out_dir.into(),
            out_extension: out_extension.to_string(),
            filename: None,
            library: None,
            library_export: None,
            externals: Vec::new(),
            globals: BTreeMap::new(),
            transforms: if format == OutputFormat::CommonJs {
                TransformChain::new(vec![TransformStep::Resolve, TransformStep::Interop])
            } else {
                TransformChain::new(vec![TransformStep::Resolve])
            },
            emit_unminified: false,
        }
    }

    /// Create a single-file bundle target from one entry file
    pub fn bundle(
        name: impl Into<String>,
        entry: impl Into<PathBuf>,
        library: impl Into<String>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Bundle,
            format: OutputFormat::Global,
            entry: EntrySpec::File(entry.into()),
            out_dir: out_dir.into(),
            out_extension: "js".to_string(),
            filename: None,
            library: Some(library.into()),
            library_export: None,
            externals: Vec::new(),
            globals: BTreeMap::new(),
            transforms: TransformChain::new(vec![TransformStep::Resolve, TransformStep::Interop]),
            emit_unminified: false,
        }
    }

    pub fn with_out_extension(mut self, extension: impl Into<String>) -> Self {
        self.out_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_library_export(mut self, export: impl Into<String>) -> Self {
        self.library_export = Some(export.into());
        self
    }

    pub fn with_externals(mut self, externals: Vec<String>) -> Self {
        self.externals = externals;
        self
    }

    pub fn with_globals(mut self, globals: BTreeMap<String, String>) -> Self {
        self.globals = globals;
        self
    }

    pub fn with_transforms(mut self, transforms: TransformChain) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn with_emit_unminified(mut self, emit: bool) -> Self {
        self.emit_unminified = emit;
        self
    }

    /// Library global name, `TinyAiApi` when unset
    pub fn library_name(&self) -> &str {
        self.library
            .as_deref()
            .unwrap_or(tinyai_config::package_json::DEFAULT_LIBRARY_NAME)
    }

    /// Bundle output name: `filename`, else `<library>.min.js` when
    /// minifying and `<library>.js` otherwise
    pub fn bundle_filename(&self) -> String {
        match &self.filename {
            Some(name) => name.clone(),
            None if self.transforms.contains("minify") => format!("{}.min.js", self.library_name()),
            None => format!("{}.js", self.library_name()),
        }
    }

    /// Name of the pre-minification companion, when one is written
    pub fn unminified_filename(&self) -> Option<String> {
        if !self.emit_unminified || !self.transforms.contains("minify") {
            return None;
        }
        let name = self.bundle_filename();
        let unminified = match name.strip_suffix(".min.js") {
            Some(stem) => format!("{}.js", stem),
            None => match name.strip_suffix(".js") {
                Some(stem) => format!("{}.unminified.js", stem),
                None => format!("{}.unminified", name),
            },
        };
        Some(unminified)
    }

    /// Output path of a source-relative module path
    pub fn module_output(&self, relative: &Path) -> PathBuf {
        self.out_dir.join(relative.with_extension(&self.out_extension))
    }

    /// Every path this target writes for the given sources
    pub fn expected_outputs(&self, sources: &SourceFileSet) -> Vec<PathBuf> {
        match self.kind {
            TargetKind::Modules => sources.iter().map(|rel| self.module_output(rel)).collect(),
            TargetKind::Bundle => {
                let mut paths = vec![self.out_dir.join(self.bundle_filename())];
                if let Some(name) = self.unminified_filename() {
                    paths.push(self.out_dir.join(name));
                }
                paths
            }
        }
    }

    /// Validate the target configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Target name cannot be empty".to_string());
        }

        if !self.format.allowed_for(self.kind) {
            return Err(format!(
                "{} target '{}' cannot emit {} output",
                self.kind, self.name, self.format
            ));
        }

        match self.kind {
            TargetKind::Modules => {
                if self.entry != EntrySpec::All {
                    return Err(format!(
                        "modules target '{}' always takes the full source set",
                        self.name
                    ));
                }
                for step in ["minify", "downlevel", "polyfill"] {
                    if self.transforms.contains(step) {
                        return Err(format!(
                            "modules target '{}' cannot run the {} step",
                            self.name, step
                        ));
                    }
                }
                if !self.globals.is_empty() {
                    return Err(format!(
                        "globals only apply to bundles, not to target '{}'",
                        self.name
                    ));
                }
                if self.out_extension.is_empty() {
                    return Err(format!("target '{}' has an empty out_extension", self.name));
                }
            }
            TargetKind::Bundle => {
                if !matches!(self.entry, EntrySpec::File(_)) {
                    return Err(format!(
                        "bundle target '{}' requires exactly one entry file",
                        self.name
                    ));
                }
                if !self.externals.is_empty() {
                    return Err(format!(
                        "bundle target '{}' inlines everything; \
                         map dependencies through globals instead",
                        self.name
                    ));
                }
            }
        }

        if self
            .transforms
            .stage(Stage::Module)
            .next()
            .map(|s| s.name() != "resolve")
            .unwrap_or(true)
        {
            return Err(format!("target '{}' must start with the resolve step", self.name));
        }

        Ok(())
    }
}

/// One file written by a build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Name of the target that produced this artifact
    pub target: String,
    /// Output file path
    pub output_path: PathBuf,
    /// Artifact metadata
    pub metadata: ArtifactMetadata,
}

impl BuildArtifact {
    pub fn new(
        target: impl Into<String>,
        output_path: PathBuf,
        metadata: ArtifactMetadata,
    ) -> Self {
        Self {
            target: target.into(),
            output_path,
            metadata,
        }
    }

    /// Get the artifact size in bytes
    pub fn size(&self) -> usize {
        self.metadata.size
    }
}

/// Metadata about a build artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Time spent on the owning target
    pub build_duration: Duration,
    /// Number of modules in the file
    pub module_count: usize,
    /// Size in bytes
    pub size: usize,
    /// Hex SHA-256 of the contents
    pub sha256: String,
    /// Toolchain version
    pub tinyai_version: String,
    /// Build timestamp
    #[serde(with = "serde_millis")]
    pub build_time: std::time::SystemTime,
}

impl ArtifactMetadata {
    pub fn new(build_duration: Duration, module_count: usize, size: usize, sha256: String) -> Self {
        Self {
            build_duration,
            module_count,
            size,
            sha256,
            tinyai_version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: std::time::SystemTime::now(),
        }
    }
}

/// Helper module for serde SystemTime serialization
mod serde_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis as u64))
    }
}

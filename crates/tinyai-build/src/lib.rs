//! tinyai packaging pipeline
//!
//! Turns one source tree of ES modules into several distributable artifacts:
//! - Source discovery for a single dialect (`.mjs` or `.js`)
//! - Module-preserving CommonJS and ESM targets
//! - A single-file browser bundle exposing a global
//! - Named transform chains (resolve, interop, downlevel, polyfill, minify)
//!   with optional external tool replacements
//! - Build profiles and configuration from `tinyai.toml`
//! - Independent, optionally parallel targets with atomic emission

pub mod builder;
pub mod bundle;
pub mod discovery;
pub mod emit;
pub mod error;
pub mod module_resolver;
pub mod output;
pub mod plan;
pub mod profile;
pub mod scan;
pub mod targets;
pub mod transform;

// Re-export main types
pub use builder::{
    build_all, BuildConfig, BuildContext, BuildOptions, BuildReport, BuildStats, Builder,
    TargetFailure,
};
pub use discovery::{discover_sources, SourceDialect, SourceFileSet};
pub use emit::{EmittedFile, Staging};
pub use error::{BuildError, BuildResult};
pub use module_resolver::{ModuleResolver, Resolution};
pub use output::{BuildSummary, OutputMode, TargetSummary};
pub use plan::plan_targets;
pub use profile::{Profile, ProfileConfig, ProfileManager};
pub use targets::{
    ArtifactMetadata, BuildArtifact, BuildTarget, EntrySpec, OutputFormat, TargetKind,
};
pub use transform::{Stage, Transform, TransformChain, TransformStep};

// Re-export tinyai-config types for convenience
pub use tinyai_config::{Config, ConfigLoader};

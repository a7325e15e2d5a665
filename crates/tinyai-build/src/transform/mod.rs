//! Transform chain
//!
//! Every capability a target needs (resolution, interop, downleveling,
//! polyfilling, minification) is a named [`Transform`]. A target carries an
//! ordered [`TransformChain`] of [`TransformStep`]s; module-stage steps run
//! on each module, chunk-stage steps run once on the linked output.

mod downlevel;
mod external;
mod interop;
mod minify;
mod polyfill;
mod resolve;

pub use downlevel::Downlevel;
pub use external::ExternalTool;
pub use interop::Interop;
pub use minify::Minify;
pub use polyfill::Polyfill;
pub use resolve::Resolve;

use crate::discovery::SourceFileSet;
use crate::module_resolver::Resolution;
use crate::targets::{BuildTarget, TargetKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure inside one transform step
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("cannot resolve '{0}'")]
    Unresolved(String),

    #[error("{0}")]
    Failed(String),
}

/// One unit of code moving through the chain: a module, or a linked chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleUnit {
    /// Absolute path of the source file (or of the chunk's output)
    pub path: PathBuf,
    /// Output key: source-relative path for modules, bundle key otherwise
    pub key: String,
    pub code: String,
    /// Dependencies recorded by `Resolve`, in source order
    pub dependencies: Vec<Dependency>,
}

impl ModuleUnit {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            code: code.into(),
            dependencies: Vec::new(),
        }
    }
}

/// A resolved import edge
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub specifier: String,
    pub resolution: Resolution,
}

/// What a transform may read besides the unit itself
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub target: &'a BuildTarget,
    pub sources: &'a SourceFileSet,
    /// Directory holding `package.json` and `node_modules`
    pub project_root: &'a Path,
}

/// A named code transformation
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        unit: &mut ModuleUnit,
        ctx: &TransformContext<'_>,
    ) -> Result<(), TransformError>;
}

/// Where in the pipeline a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Once per module, before linking
    Module,
    /// Once on the emitted chunk
    Chunk,
}

/// A step in a target's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformStep {
    Resolve,
    Interop,
    Downlevel,
    Polyfill,
    Minify,
    /// Shell command standing in for the built-in step named `step`
    External { step: String, command: String },
}

impl TransformStep {
    /// Built-in step for a name used in `[tools]`
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "resolve" => Some(Self::Resolve),
            "interop" => Some(Self::Interop),
            "downlevel" => Some(Self::Downlevel),
            "polyfill" => Some(Self::Polyfill),
            "minify" => Some(Self::Minify),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Resolve => "resolve",
            Self::Interop => "interop",
            Self::Downlevel => "downlevel",
            Self::Polyfill => "polyfill",
            Self::Minify => "minify",
            Self::External { step, .. } => step,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Resolve | Self::Interop | Self::Downlevel => Stage::Module,
            Self::Polyfill | Self::Minify => Stage::Chunk,
            Self::External { step, .. } => Self::builtin(step)
                .map(|s| s.stage())
                .unwrap_or(Stage::Chunk),
        }
    }

    /// Instantiate the transform implementing this step
    pub fn transform(&self) -> Box<dyn Transform> {
        match self {
            Self::Resolve => Box::new(Resolve),
            Self::Interop => Box::new(Interop),
            Self::Downlevel => Box::new(Downlevel),
            Self::Polyfill => Box::new(Polyfill),
            Self::Minify => Box::new(Minify),
            Self::External { step, command } => Box::new(ExternalTool::new(step, command)),
        }
    }
}

impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External { step, command } => write!(f, "{} ({})", step, command),
            other => f.write_str(other.name()),
        }
    }
}

/// Ordered list of steps for one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformChain {
    steps: Vec<TransformStep>,
}

/// Step switches a profile or target can toggle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainFlags {
    pub downlevel: bool,
    pub polyfill: bool,
    pub minify: bool,
}

impl TransformChain {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    /// Standard chain for a target kind.
    ///
    /// Module-preserving targets never downlevel, polyfill or minify;
    /// only bundles take the optional steps.
    pub fn for_target(kind: TargetKind, commonjs: bool, flags: ChainFlags) -> Self {
        let mut steps = vec![TransformStep::Resolve];
        match kind {
            TargetKind::Modules => {
                if commonjs {
                    steps.push(TransformStep::Interop);
                }
            }
            TargetKind::Bundle => {
                steps.push(TransformStep::Interop);
                if flags.downlevel {
                    steps.push(TransformStep::Downlevel);
                }
                if flags.polyfill {
                    steps.push(TransformStep::Polyfill);
                }
                if flags.minify {
                    steps.push(TransformStep::Minify);
                }
            }
        }
        Self { steps }
    }

    /// Replace built-in steps with the commands configured for them
    pub fn with_tools(mut self, tools: &BTreeMap<String, String>) -> Self {
        for step in &mut self.steps {
            if let Some(command) = tools.get(step.name()) {
                *step = TransformStep::External {
                    step: step.name().to_string(),
                    command: command.clone(),
                };
            }
        }
        self
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &TransformStep> {
        self.steps.iter().filter(move |s| s.stage() == stage)
    }

    /// Whether a step with this name (built-in or replaced) is present
    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Apply text edits, given as non-overlapping byte ranges, to `source`
pub(crate) fn apply_edits(source: &str, mut edits: Vec<(usize, usize, String)>) -> String {
    edits.sort_by_key(|(start, _, _)| *start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        if start < cursor {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_chains_never_minify() {
        let flags = ChainFlags {
            downlevel: true,
            polyfill: true,
            minify: true,
        };
        let cjs = TransformChain::for_target(TargetKind::Modules, true, flags);
        assert_eq!(cjs.steps(), &[TransformStep::Resolve, TransformStep::Interop]);

        let esm = TransformChain::for_target(TargetKind::Modules, false, flags);
        assert_eq!(esm.steps(), &[TransformStep::Resolve]);
    }

    #[test]
    fn test_bundle_chain_order() {
        let chain = TransformChain::for_target(
            TargetKind::Bundle,
            false,
            ChainFlags {
                downlevel: true,
                polyfill: true,
                minify: true,
            },
        );
        let names: Vec<_> = chain.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["resolve", "interop", "downlevel", "polyfill", "minify"]);
        assert_eq!(chain.stage(Stage::Chunk).count(), 2);
    }

    #[test]
    fn test_tools_replace_named_step() {
        let mut tools = BTreeMap::new();
        tools.insert("minify".to_string(), "npx terser".to_string());
        let chain = TransformChain::for_target(
            TargetKind::Bundle,
            false,
            ChainFlags {
                minify: true,
                ..Default::default()
            },
        )
        .with_tools(&tools);

        let last = chain.steps().last().unwrap();
        assert_eq!(
            last,
            &TransformStep::External {
                step: "minify".to_string(),
                command: "npx terser".to_string()
            }
        );
        assert_eq!(last.stage(), Stage::Chunk);
        assert!(chain.contains("minify"));
    }

    #[test]
    fn test_apply_edits() {
        let out = apply_edits(
            "abcdef",
            vec![(4, 5, "E".to_string()), (0, 1, "A".to_string())],
        );
        assert_eq!(out, "AbcdEf");
    }
}

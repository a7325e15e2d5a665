//! Build reporting
//!
//! The serializable summary of a build run that front ends print, either as
//! JSON or as human-readable lines.

use crate::builder::BuildContext;
use serde::Serialize;
use std::path::PathBuf;

/// How much a front end prints about a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Normal,
    /// Per-artifact detail
    Verbose,
    /// Errors only
    Quiet,
    /// A single JSON document on stdout
    Json,
}

impl OutputMode {
    /// Mode selected by command-line switches; `json` wins over `quiet`,
    /// which wins over `verbose`
    pub fn from_flags(verbose: bool, quiet: bool, json: bool) -> Self {
        if json {
            Self::Json
        } else if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

/// Summary of one build run
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub success: bool,
    pub profile: String,
    pub source_root: PathBuf,
    pub source_files: usize,
    pub targets: Vec<TargetSummary>,
    pub total_time: f64,
}

/// Outcome of one target
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub size: usize,
    pub sha256: String,
    pub modules: usize,
}

impl BuildSummary {
    pub fn from_context(context: &BuildContext) -> Self {
        let report = &context.report;
        let mut targets: Vec<TargetSummary> = report
            .built
            .iter()
            .map(|name| TargetSummary {
                name: name.clone(),
                success: true,
                artifacts: report
                    .artifacts_for(name)
                    .map(|a| ArtifactSummary {
                        path: a.output_path.clone(),
                        size: a.size(),
                        sha256: a.metadata.sha256.clone(),
                        modules: a.metadata.module_count,
                    })
                    .collect(),
                error: None,
            })
            .collect();
        targets.extend(report.failures.iter().map(|f| TargetSummary {
            name: f.target.clone(),
            success: false,
            artifacts: Vec::new(),
            error: Some(f.error.to_string()),
        }));

        Self {
            success: report.is_success(),
            profile: context.profile.name.clone(),
            source_root: context.sources.root().to_path_buf(),
            source_files: context.sources.len(),
            targets,
            total_time: context.stats.total_time.as_secs_f64(),
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

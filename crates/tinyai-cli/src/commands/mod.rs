pub mod build;
pub mod clean;
pub mod sources;
pub mod type_of;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tinyai_build::{Builder, SourceDialect};
use tracing::debug;

/// Builder for `project_dir` (the current directory when unset)
pub fn open_builder(project_dir: Option<PathBuf>, dialect: Option<&str>) -> Result<Builder> {
    let project_dir = project_dir.unwrap_or_else(|| PathBuf::from("."));
    debug!("Opening project at {}", project_dir.display());
    let mut builder = Builder::new(&project_dir)
        .with_context(|| format!("Failed to load project at {}", project_dir.display()))?;
    if let Some(dialect) = dialect {
        let dialect = SourceDialect::parse(dialect).context("Invalid --dialect")?;
        builder = builder.with_dialect(dialect);
    }
    Ok(builder)
}

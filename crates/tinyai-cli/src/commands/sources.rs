//! Sources command - list the SourceFileSet of a project

use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn run(project_dir: Option<PathBuf>, dialect: Option<String>, json: bool) -> Result<()> {
    let builder = super::open_builder(project_dir, dialect.as_deref())?;
    let sources = builder.discover().context("Source discovery failed")?;

    if json {
        let files: Vec<String> = sources
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "root": sources.root(),
                "extension": sources.extension(),
                "files": files,
            })
        );
    } else {
        for path in &sources {
            println!("{}", path.display());
        }
    }

    Ok(())
}

//! Clean command - remove build output

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

pub fn run(project_dir: Option<PathBuf>) -> Result<()> {
    let builder = super::open_builder(project_dir, None)?;
    let removed = builder.clean().context("Failed to clean build output")?;

    if removed.is_empty() {
        println!("Nothing to clean");
    }
    for dir in removed {
        println!("{} {}", "     Removed".green().bold(), dir.display());
    }
    Ok(())
}

//! Build command - package the project with profiles and target selection

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tinyai_build::{BuildContext, BuildSummary, OutputMode, Profile};

/// Build command arguments
#[derive(Default)]
pub struct BuildArgs {
    /// Build profile (dev, release, or custom)
    pub profile: Option<String>,
    /// Build in release mode (shorthand for --profile=release)
    pub release: bool,
    /// Source dialect override
    pub dialect: Option<String>,
    /// Targets to build; all when empty
    pub targets: Vec<String>,
    /// Project directory (defaults to current directory)
    pub project_dir: Option<PathBuf>,
    /// Output directory override
    pub out_dir: Option<PathBuf>,
    /// Remove previous output first
    pub clean: bool,
    /// Verbose output
    pub verbose: bool,
    /// Quiet output (errors only)
    pub quiet: bool,
    /// JSON output
    pub json: bool,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let output_mode = determine_output_mode(&args);

    let mut builder = super::open_builder(args.project_dir.clone(), args.dialect.as_deref())?
        .with_output_mode(output_mode)
        .with_target_filter(args.targets.clone());
    if let Some(profile) = determine_profile(&args)? {
        builder = builder.with_profile(profile);
    }
    if let Some(out_dir) = &args.out_dir {
        builder = builder.with_output_dir(out_dir.clone());
    }

    if args.clean {
        if output_mode == OutputMode::Normal || output_mode == OutputMode::Verbose {
            println!("{} previous output", "Cleaning".green().bold());
        }
        builder.clean().context("Failed to clean build output")?;
    }

    let context = builder.build().context("Build failed")?;
    let summary = BuildSummary::from_context(&context);

    match output_mode {
        OutputMode::Json => println!("{}", summary.to_json()),
        OutputMode::Quiet => print_failures(&context),
        OutputMode::Normal | OutputMode::Verbose => print_human(&context, output_mode),
    }

    if !context.is_success() {
        anyhow::bail!(
            "{} of {} targets failed",
            context.stats.targets_failed,
            context.stats.targets_failed + context.stats.targets_built
        );
    }

    Ok(())
}

/// Determine build profile from arguments; None defers to tinyai.toml
fn determine_profile(args: &BuildArgs) -> Result<Option<Profile>> {
    if args.release {
        Ok(Some(Profile::Release))
    } else if let Some(ref profile_name) = args.profile {
        Profile::from_str(profile_name)
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid profile: {}", e))
    } else {
        Ok(None)
    }
}

/// Determine output mode from arguments
fn determine_output_mode(args: &BuildArgs) -> OutputMode {
    OutputMode::from_flags(args.verbose, args.quiet, args.json)
}

fn print_failures(context: &BuildContext) {
    for failure in &context.report.failures {
        eprintln!(
            "{} target '{}': {}",
            "error:".red().bold(),
            failure.target,
            failure.error
        );
    }
}

fn print_human(context: &BuildContext, mode: OutputMode) {
    for name in &context.report.built {
        println!("{} {}", "   Packaged".green().bold(), name);
        for artifact in context.report.artifacts_for(name) {
            if mode == OutputMode::Verbose {
                println!(
                    "             {} ({} bytes, sha256 {})",
                    artifact.output_path.display(),
                    artifact.size(),
                    &artifact.metadata.sha256[..12.min(artifact.metadata.sha256.len())]
                );
            } else {
                println!("             {}", artifact.output_path.display());
            }
        }
    }
    print_failures(context);

    let stats = &context.stats;
    let headline = format!(
        "{} profile: {} sources, {} of {} targets in {:.2}s",
        context.profile.name,
        stats.source_files,
        stats.targets_built,
        stats.targets_built + stats.targets_failed,
        stats.total_time.as_secs_f64()
    );
    if context.is_success() {
        println!("{} {}", "    Finished".green().bold(), headline);
    } else {
        println!("{} {}", "      Failed".red().bold(), headline);
    }
}

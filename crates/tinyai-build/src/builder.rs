//! Build orchestration and pipeline management
use crate::bundle;
use crate::discovery::{discover_sources, SourceDialect, SourceFileSet};
use crate::emit::{invalidate, EmittedFile, Staging};
use crate::error::{BuildError, BuildResult};
use crate::module_resolver::{module_key, normalize, Resolution};
use crate::output::OutputMode;
use crate::plan::plan_targets;
use crate::profile::{Profile, ProfileConfig, ProfileManager};
use crate::targets::{ArtifactMetadata, BuildArtifact, BuildTarget, EntrySpec, TargetKind};
use crate::transform::{
    ModuleUnit, Stage, Transform, TransformContext, TransformError, TransformStep,
};

use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tinyai_config::{Config, ConfigLoader};
use tracing::{debug, info, warn};

/// Build configuration
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Profile selecting optional steps and parallelism
    pub profile: Option<Profile>,
    /// Source dialect; the configured one (or `.mjs`) when unset
    pub dialect: Option<SourceDialect>,
    /// Build only the named targets; all of them when empty
    pub target_filter: Vec<String>,
    /// Output root override
    pub output_dir: Option<PathBuf>,
    pub output_mode: OutputMode,
}

/// Build context - result of a build run
#[derive(Debug)]
pub struct BuildContext {
    /// Profile the run used
    pub profile: ProfileConfig,
    /// Files the run discovered
    pub sources: SourceFileSet,
    /// Per-target outcome
    pub report: BuildReport,
    /// Build statistics
    pub stats: BuildStats,
}

impl BuildContext {
    /// True when every target succeeded
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }
}

/// Build statistics
#[derive(Debug, Clone)]
pub struct BuildStats {
    /// Number of discovered source files
    pub source_files: usize,
    /// Targets that emitted their artifacts
    pub targets_built: usize,
    /// Targets that failed
    pub targets_failed: usize,
    /// Files written across all targets
    pub artifacts: usize,
    /// Time spent discovering sources
    pub discovery_time: Duration,
    /// Total build time
    pub total_time: Duration,
}

impl BuildStats {
    /// Create new build statistics
    pub fn new() -> Self {
        Self {
            source_files: 0,
            targets_built: 0,
            targets_failed: 0,
            artifacts: 0,
            discovery_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }
}

impl Default for BuildStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A target that did not produce its artifacts
#[derive(Debug)]
pub struct TargetFailure {
    pub target: String,
    pub error: BuildError,
}

/// Outcome of [`build_all`]
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Every file written, grouped by target in target order
    pub artifacts: Vec<BuildArtifact>,
    /// Names of the targets that succeeded, in target order
    pub built: Vec<String>,
    pub failures: Vec<TargetFailure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Artifacts written by one target
    pub fn artifacts_for<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a BuildArtifact> {
        self.artifacts.iter().filter(move |a| a.target == target)
    }

    /// Failure of one target, if it failed
    pub fn failure(&self, target: &str) -> Option<&BuildError> {
        self.failures
            .iter()
            .find(|f| f.target == target)
            .map(|f| &f.error)
    }
}

/// Knobs for [`build_all`]
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions<'a> {
    /// Directory holding `package.json` and `node_modules`
    pub project_root: &'a Path,
    /// Run targets on the rayon pool
    pub parallel: bool,
}

/// Run every target over `sources`.
///
/// Targets are independent: a failure is recorded in the report and its
/// stale outputs are removed, while the other targets still run.
pub fn build_all(
    sources: &SourceFileSet,
    targets: &[BuildTarget],
    options: &BuildOptions<'_>,
) -> BuildReport {
    let run = |target: &BuildTarget| {
        let start = Instant::now();
        info!(
            target = %target.name,
            kind = %target.kind,
            format = %target.format,
            "building target"
        );
        let result = build_target(sources, target, options.project_root, start);
        if result.is_err() {
            match invalidate(&target.expected_outputs(sources)) {
                Ok(0) => {}
                Ok(removed) => debug!(target = %target.name, removed, "removed stale outputs"),
                Err(e) => {
                    warn!(target = %target.name, error = %e, "could not remove stale outputs")
                }
            }
        }
        (target.name.clone(), result)
    };

    let results: Vec<(String, BuildResult<Vec<BuildArtifact>>)> = if options.parallel {
        targets.par_iter().map(run).collect()
    } else {
        targets.iter().map(run).collect()
    };

    let mut report = BuildReport::default();
    for (name, result) in results {
        match result {
            Ok(artifacts) => {
                info!(target = %name, files = artifacts.len(), "target finished");
                report.artifacts.extend(artifacts);
                report.built.push(name);
            }
            Err(error) => {
                warn!(target = %name, error = %error, "target failed");
                report.failures.push(TargetFailure {
                    target: name,
                    error,
                });
            }
        }
    }
    report
}

fn build_target(
    sources: &SourceFileSet,
    target: &BuildTarget,
    project_root: &Path,
    start: Instant,
) -> BuildResult<Vec<BuildArtifact>> {
    target.validate().map_err(BuildError::InvalidTarget)?;

    let ctx = TransformContext {
        target,
        sources,
        project_root,
    };
    let emitted = match target.kind {
        TargetKind::Modules => build_modules(&ctx)?,
        TargetKind::Bundle => build_bundle(&ctx)?,
    };

    let duration = start.elapsed();
    Ok(emitted
        .into_iter()
        .map(|file| {
            let metadata =
                ArtifactMetadata::new(duration, file.module_count, file.size, file.sha256);
            BuildArtifact::new(&target.name, file.path, metadata)
        })
        .collect())
}

/// A chain step paired with its implementation
struct Step {
    step: TransformStep,
    transform: Box<dyn Transform>,
}

fn instantiate(target: &BuildTarget, stage: Stage) -> Vec<Step> {
    target
        .transforms
        .stage(stage)
        .map(|step| Step {
            step: step.clone(),
            transform: step.transform(),
        })
        .collect()
}

fn run_step(step: &Step, unit: &mut ModuleUnit, ctx: &TransformContext<'_>) -> BuildResult<()> {
    step.transform.apply(unit, ctx).map_err(|e| match e {
        TransformError::Unresolved(specifier) => BuildError::unresolved(&unit.path, specifier),
        TransformError::Failed(message) => {
            BuildError::transform(&ctx.target.name, step.step.name(), &unit.path, message)
        }
    })
}

fn read_source(path: &Path) -> BuildResult<String> {
    fs::read_to_string(path).map_err(|e| BuildError::io(path, e))
}

/// One output per source, mirroring the source tree
fn build_modules(ctx: &TransformContext<'_>) -> BuildResult<Vec<EmittedFile>> {
    let target = ctx.target;
    let sources = ctx.sources;
    let steps = instantiate(target, Stage::Module);
    let mut staging = Staging::new(&target.out_dir)?;

    for relative in sources {
        let path = sources.absolute(relative);
        let mut unit =
            ModuleUnit::new(&path, module_key(sources.root(), &path), read_source(&path)?);
        for step in &steps {
            run_step(step, &mut unit, ctx)?;
        }
        debug!(target = %target.name, module = %unit.key, "transformed module");
        staging.write(&relative.with_extension(&target.out_extension), &unit.code, 1)?;
    }

    staging.commit()
}

/// Everything reachable from the entry, linked into one script
fn build_bundle(ctx: &TransformContext<'_>) -> BuildResult<Vec<EmittedFile>> {
    let target = ctx.target;
    let entry = match &target.entry {
        EntrySpec::File(path) => normalize(path),
        EntrySpec::All => {
            return Err(BuildError::InvalidTarget(format!(
                "bundle target '{}' has no entry file",
                target.name
            )))
        }
    };
    if !entry.is_file() {
        return Err(BuildError::missing_entry(&target.name, &entry));
    }

    let module_steps = instantiate(target, Stage::Module);
    let mut modules = Vec::new();
    let mut seen = HashSet::from([entry.clone()]);
    let mut queue = VecDeque::from([entry.clone()]);

    while let Some(path) = queue.pop_front() {
        let code = read_source(&path)?;
        let mut unit = ModuleUnit::new(&path, module_key(ctx.project_root, &path), code);

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            unit.code = format!("module.exports = {};\n", unit.code.trim_end());
        } else {
            for step in &module_steps {
                run_step(step, &mut unit, ctx)?;
            }
        }

        for dep in &unit.dependencies {
            if let Resolution::Module(dep_path) = &dep.resolution {
                let dep_path = normalize(dep_path);
                if seen.insert(dep_path.clone()) {
                    queue.push_back(dep_path);
                }
            }
        }
        modules.push(unit);
    }
    debug!(target = %target.name, modules = modules.len(), "collected bundle modules");

    let filename = target.bundle_filename();
    let linked = bundle::link(target, &modules, &module_key(ctx.project_root, &entry));
    let mut chunk = ModuleUnit::new(target.out_dir.join(&filename), filename.clone(), linked);

    let unminified_name = target.unminified_filename();
    let mut unminified = None;
    for step in instantiate(target, Stage::Chunk) {
        if step.step.name() == "minify" && unminified_name.is_some() {
            unminified = Some(chunk.code.clone());
        }
        run_step(&step, &mut chunk, ctx)?;
    }

    let mut staging = Staging::new(&target.out_dir)?;
    staging.write(Path::new(&filename), &chunk.code, modules.len())?;
    if let (Some(name), Some(code)) = (unminified_name, unminified) {
        staging.write(Path::new(&name), &code, modules.len())?;
    }
    staging.commit()
}

/// Main builder for orchestrating builds
pub struct Builder {
    /// Loaded tinyai.toml and package.json
    config: Config,
    /// Build configuration
    build: BuildConfig,
    profiles: ProfileManager,
}

impl Builder {
    /// Create a new builder for the project containing `project_dir`
    pub fn new(project_dir: impl AsRef<Path>) -> BuildResult<Self> {
        let project_dir = project_dir.as_ref();
        let project_dir =
            fs::canonicalize(project_dir).map_err(|e| BuildError::io(project_dir, e))?;
        let config = ConfigLoader::new().load_from_directory(&project_dir)?;
        Self::from_config(config)
    }

    /// Create a builder from an already loaded configuration
    pub fn from_config(config: Config) -> BuildResult<Self> {
        let mut profiles = ProfileManager::new();
        profiles.load_from_manifest(&config.project.profiles)?;
        Ok(Self {
            config,
            build: BuildConfig::default(),
            profiles,
        })
    }

    /// Set build configuration
    pub fn with_config(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.build.profile = Some(profile);
        self
    }

    pub fn with_dialect(mut self, dialect: SourceDialect) -> Self {
        self.build.dialect = Some(dialect);
        self
    }

    /// Restrict the build to the named targets
    pub fn with_target_filter(mut self, names: Vec<String>) -> Self {
        self.build.target_filter = names;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.build.output_mode = mode;
        self
    }

    /// Override the output root
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build.output_dir = Some(dir.into());
        self
    }

    /// Loaded configuration, with the output override applied
    pub fn config(&self) -> Config {
        let mut config = self.config.clone();
        if let Some(dir) = &self.build.output_dir {
            config.project.build_mut().output = Some(dir.clone());
        }
        config
    }

    pub fn output_mode(&self) -> OutputMode {
        self.build.output_mode
    }

    /// Effective profile: explicit, then `[build] profile`, then release
    pub fn profile(&self) -> BuildResult<Profile> {
        match (&self.build.profile, self.config.project.profile()) {
            (Some(profile), _) => Ok(profile.clone()),
            (None, Some(name)) => Profile::from_str(name),
            (None, None) => Ok(Profile::default()),
        }
    }

    pub fn profile_config(&self) -> BuildResult<ProfileConfig> {
        self.profiles.get(&self.profile()?)
    }

    pub fn profiles(&self) -> &ProfileManager {
        &self.profiles
    }

    /// Effective dialect: explicit, then `[build] dialect`, then `.mjs`
    pub fn dialect(&self) -> BuildResult<SourceDialect> {
        match (&self.build.dialect, self.config.project.dialect()) {
            (Some(dialect), _) => Ok(dialect.clone()),
            (None, Some(name)) => SourceDialect::parse(name),
            (None, None) => Ok(SourceDialect::default()),
        }
    }

    /// Planned targets, after the target filter
    pub fn targets(&self) -> BuildResult<Vec<BuildTarget>> {
        self.plan(&self.profile_config()?, &self.dialect()?)
    }

    fn plan(
        &self,
        profile: &ProfileConfig,
        dialect: &SourceDialect,
    ) -> BuildResult<Vec<BuildTarget>> {
        let targets = plan_targets(&self.config(), profile, dialect)?;
        let filter = &self.build.target_filter;
        if filter.is_empty() {
            return Ok(targets);
        }

        let unknown = filter.iter().find(|name| !targets.iter().any(|t| t.name == **name));
        if let Some(unknown) = unknown {
            return Err(BuildError::InvalidTarget(format!("no target named '{}'", unknown)));
        }
        Ok(targets
            .into_iter()
            .filter(|t| filter.contains(&t.name))
            .collect())
    }

    /// Discover the sources of this project
    pub fn discover(&self) -> BuildResult<SourceFileSet> {
        let dialect = self.dialect()?;
        discover_sources(self.config().source_dir(), dialect.extension())
    }

    /// Execute a build
    pub fn build(&self) -> BuildResult<BuildContext> {
        let build_start = Instant::now();

        let profile = self.profile_config()?;
        let dialect = self.dialect()?;
        let targets = self.plan(&profile, &dialect)?;
        info!(
            profile = %profile.name,
            dialect = %dialect,
            targets = targets.len(),
            "starting build"
        );

        let discovery_start = Instant::now();
        let sources = discover_sources(self.config().source_dir(), dialect.extension())?;
        let discovery_time = discovery_start.elapsed();
        info!(files = sources.len(), root = %sources.root().display(), "discovered sources");

        let options = BuildOptions {
            project_root: self.config.root_dir(),
            parallel: profile.parallel,
        };
        let report = build_all(&sources, &targets, &options);

        if self.build.output_mode == OutputMode::Verbose {
            for artifact in &report.artifacts {
                info!(
                    target = %artifact.target,
                    path = %artifact.output_path.display(),
                    size = artifact.size(),
                    "wrote artifact"
                );
            }
        }

        let stats = BuildStats {
            source_files: sources.len(),
            targets_built: report.built.len(),
            targets_failed: report.failures.len(),
            artifacts: report.artifacts.len(),
            discovery_time,
            total_time: build_start.elapsed(),
        };
        info!(
            built = stats.targets_built,
            failed = stats.targets_failed,
            secs = stats.total_time.as_secs_f64(),
            "build finished"
        );

        Ok(BuildContext {
            profile,
            sources,
            report,
            stats,
        })
    }

    /// Remove the output root and any target directory outside it.
    ///
    /// Returns the directories that existed and were removed.
    pub fn clean(&self) -> BuildResult<Vec<PathBuf>> {
        let config = self.config();
        let output_dir = config.output_dir();
        let mut dirs = vec![output_dir.clone()];
        if let Ok(targets) = self.targets() {
            for target in targets {
                if !target.out_dir.starts_with(&output_dir) && !dirs.contains(&target.out_dir) {
                    dirs.push(target.out_dir);
                }
            }
        }

        let mut removed = Vec::new();
        for dir in dirs {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {
                    info!(dir = %dir.display(), "removed output directory");
                    removed.push(dir);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(BuildError::io(&dir, e)),
            }
        }
        Ok(removed)
    }
}

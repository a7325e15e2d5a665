use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// tinyai packaging toolchain.
///
/// Builds the tinyai client library into CommonJS modules, ES modules and a
/// minified browser bundle from one source tree.
///
/// EXAMPLES:
///     tinyai build                      Build every target (release profile)
///     tinyai build --profile dev        Readable, unminified bundle
///     tinyai build --target browser     Only the browser bundle
///     tinyai sources --dialect js       List the files a .js build would use
///     tinyai typeof '[1, 2]'            Classify a JSON value
///
/// ENVIRONMENT VARIABLES:
///     TINYAI_PROFILE        Default build profile
///     TINYAI_DIALECT        Default source dialect (mjs or js)
///     TINYAI_OUTPUT         Output directory
///     TINYAI_OUTPUT_FORMAT  Set to 'json' for JSON output by default
///     NO_COLOR              Set to disable colored output
///     RUST_LOG              Log filter (overrides -v)
#[derive(Parser)]
#[command(name = "tinyai")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Log progress while working
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project's targets
    ///
    /// Discovers sources, then runs every configured target. Targets are
    /// independent; the command fails if any of them fails.
    ///
    /// EXAMPLES:
    ///     tinyai build                   Build with the configured profile
    ///     tinyai build --release         Minified, downleveled bundle
    ///     tinyai build --json            Machine-readable summary
    #[command(visible_alias = "b")]
    Build {
        /// Build profile (dev, release, or custom)
        #[arg(long, short = 'p')]
        profile: Option<String>,
        /// Shorthand for --profile=release
        #[arg(long)]
        release: bool,
        /// Source dialect (mjs, js, or a .suffix)
        #[arg(long)]
        dialect: Option<String>,
        /// Build only this target (repeatable)
        #[arg(long = "target", short = 't')]
        targets: Vec<String>,
        /// Project directory (defaults to current directory)
        #[arg(long)]
        project_dir: Option<PathBuf>,
        /// Output directory override
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Remove previous output first
        #[arg(long)]
        clean: bool,
        /// Quiet output (errors only)
        #[arg(long, short = 'q')]
        quiet: bool,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// List the source files a build would process
    ///
    /// EXAMPLES:
    ///     tinyai sources
    ///     tinyai sources --dialect js --json
    Sources {
        /// Source dialect (mjs, js, or a .suffix)
        #[arg(long)]
        dialect: Option<String>,
        /// Project directory (defaults to current directory)
        #[arg(long)]
        project_dir: Option<PathBuf>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Remove build output
    Clean {
        /// Project directory (defaults to current directory)
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },

    /// Classify a JSON value the way the runtime type oracle does
    ///
    /// Prints the lowercase type tag, or with --is whether the value matches
    /// a capitalized class name. The literal `undefined` is accepted.
    ///
    /// EXAMPLES:
    ///     tinyai typeof '{"a": 1}'       object
    ///     tinyai typeof '[]' --is Array  true
    ///     tinyai typeof '[]' --is array  false
    #[command(name = "typeof")]
    TypeOf {
        /// JSON literal, or `undefined`
        value: String,
        /// Class name to test against (e.g. Array, String)
        #[arg(long = "is")]
        class: Option<String>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();
    init_logging(cli.verbose);

    if cli_config.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Build {
            profile,
            release,
            dialect,
            targets,
            project_dir,
            out_dir,
            clean,
            quiet,
            json,
        } => {
            // Command-line flag overrides environment variable
            let use_json = json || cli_config.default_json;
            let args = commands::build::BuildArgs {
                profile,
                release,
                dialect,
                targets,
                project_dir,
                out_dir,
                clean,
                verbose: cli.verbose,
                quiet,
                json: use_json,
            };
            commands::build::run(args)?;
        }
        Commands::Sources {
            dialect,
            project_dir,
            json,
        } => {
            let use_json = json || cli_config.default_json;
            commands::sources::run(project_dir, dialect, use_json)?;
        }
        Commands::Clean { project_dir } => {
            commands::clean::run(project_dir)?;
        }
        Commands::TypeOf { value, class, json } => {
            let use_json = json || cli_config.default_json;
            commands::type_of::run(&value, class.as_deref(), use_json)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

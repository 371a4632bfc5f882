//! Geolint CLI
//!
//! One subcommand per check. Every check reads a JSON-lines entity file and
//! writes its channels, feature store and stats database into an output
//! directory:
//!
//! - `colocated-nodes`: points sharing a location
//! - `orphans`: entities nobody references
//! - `relation-problems` / `multipolygon-problems`: group rules
//! - `unusual-tags`: odd keys, values and misplaced type tags

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use geolint_check::relations::RelationMode;
use geolint_check::{
    colocated, orphans, relations, unusual_tags, CheckConfig, CheckError, CheckReport,
    OrphanPolicy,
};
use geolint_index::DedupConfig;
use geolint_model::{ConfigError, Cutoff, JsonlSource};

#[derive(Parser)]
#[command(name = "geolint")]
#[command(author, version, about = "Geolint: find anomalies in geospatial entity data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find points sharing the same location.
    ColocatedNodes {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        cutoff: CutoffArgs,
        /// Directory for the temporary bucket files (default: OUTPUT_DIR)
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },

    /// Find untagged or barely tagged entities nothing references.
    Orphans {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        cutoff: CutoffArgs,
        /// Only report entities without any tags
        #[arg(short = 'u', long)]
        untagged_only: bool,
        /// Do not report entities without any tags
        #[arg(short = 'U', long)]
        no_untagged: bool,
    },

    /// Check groups for structural and tagging problems.
    RelationProblems {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        cutoff: CutoffArgs,
    },

    /// Compare multipolygon tags with the tags of their member lines.
    ///
    /// Every multipolygon is checked, whatever its age.
    MultipolygonProblems {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Find unusual tag keys and values.
    UnusualTags {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        cutoff: CutoffArgs,
    },
}

#[derive(Args)]
struct CutoffArgs {
    /// Only include entities at least DAYS days old
    #[arg(short = 'a', long = "age", value_name = "DAYS")]
    age: Option<u32>,
    /// Only include entities last changed before this time (yyyy-mm-ddThh:mm:ssZ)
    #[arg(short = 'b', long, value_name = "TIMESTAMP")]
    before: Option<String>,
}

impl CutoffArgs {
    fn cutoff(&self) -> Result<Cutoff, ConfigError> {
        Cutoff::from_options(self.before.as_deref(), self.age, chrono::Utc::now())
    }
}

#[derive(Args)]
struct CommonArgs {
    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
    /// Input entity file (JSON lines)
    input: PathBuf,
    /// Directory receiving all outputs
    output_dir: PathBuf,
}

impl CommonArgs {
    fn config(&self, cutoff: Option<&CutoffArgs>) -> Result<CheckConfig, ConfigError> {
        let cutoff = match cutoff {
            Some(args) => args.cutoff()?,
            None => Cutoff::none(),
        };
        Ok(CheckConfig::new(&self.output_dir).with_cutoff(cutoff))
    }

    fn open_input(&self) -> Result<JsonlSource> {
        JsonlSource::open(&self.input)
            .with_context(|| format!("failed to open input {}", self.input.display()))
    }
}

impl Commands {
    fn common(&self) -> &CommonArgs {
        match self {
            Commands::ColocatedNodes { common, .. }
            | Commands::Orphans { common, .. }
            | Commands::RelationProblems { common, .. }
            | Commands::MultipolygonProblems { common }
            | Commands::UnusualTags { common, .. } => common,
        }
    }

    fn cutoff(&self) -> Option<&CutoffArgs> {
        match self {
            Commands::ColocatedNodes { cutoff, .. }
            | Commands::Orphans { cutoff, .. }
            | Commands::RelationProblems { cutoff, .. }
            | Commands::UnusualTags { cutoff, .. } => Some(cutoff),
            Commands::MultipolygonProblems { .. } => None,
        }
    }
}

fn init_logging(quiet: bool) {
    let level = if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: &Commands) -> Result<CheckReport> {
    let common = command.common();
    let config = common.config(command.cutoff())?;
    let source = common.open_input()?;

    let report = match command {
        Commands::ColocatedNodes { work_dir, .. } => {
            let work_dir = work_dir.clone().unwrap_or_else(|| common.output_dir.clone());
            colocated::run(&source, &config, &DedupConfig::new(work_dir))?
        }
        Commands::Orphans {
            untagged_only,
            no_untagged,
            ..
        } => {
            let policy = OrphanPolicy::from_flags(*untagged_only, *no_untagged)?;
            orphans::run(&source, &config, policy)?
        }
        Commands::RelationProblems { .. } => {
            relations::run(&source, &config, RelationMode::RelationProblems)?
        }
        Commands::MultipolygonProblems { .. } => {
            relations::run(&source, &config, RelationMode::MultipolygonProblems)?
        }
        Commands::UnusualTags { .. } => unusual_tags::run(&source, &config)?,
    };
    Ok(report)
}

fn print_summary(report: &CheckReport) {
    println!(
        "{} {} (data as of {})",
        "Finished".green().bold(),
        report.check.bold(),
        geolint_model::to_iso(report.run_timestamp).cyan()
    );
    for (name, value) in report.counters.iter() {
        let value = if value > 0 {
            value.to_string().yellow()
        } else {
            value.to_string().normal()
        };
        println!("  {name}: {value}");
    }
    let geometry_errors: u64 = report.channels.iter().map(|c| c.geometry_errors).sum();
    if geometry_errors > 0 {
        println!(
            "  {} {} features skipped (no usable geometry)",
            "note:".yellow().bold(),
            geometry_errors
        );
    }
}

fn is_config_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConfigError>().is_some()
        || err
            .downcast_ref::<CheckError>()
            .is_some_and(CheckError::is_config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.common().quiet);

    match run(&cli.command) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            if is_config_error(&err) {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

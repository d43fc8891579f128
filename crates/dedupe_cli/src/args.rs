// crates/dedupe_cli/src/args.rs
//
// Argument surface for the `dedupe` binary. Parsing is clap-derive; the
// semantic checks that clap cannot express (stage names, run-id shape,
// worker counts) happen in `parse_and_validate` so main() only ever sees
// a well-formed request.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dedupe_core::entities::{RunType, StageName};
use dedupe_core::ids::RunId;

#[derive(Debug, Parser)]
#[command(name = "dedupe", about = "Record-deduplication engine for account exports", version)]
pub struct Cli {
    /// Suppress the human summary lines (logs still honor DEDUPE_LOG).
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline end-to-end (resumes automatically).
    Run(RunArgs),
    /// Inspect and maintain the run store.
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Resolved input CSV.
    #[arg(long)]
    pub input: PathBuf,

    /// Output root (holds interim/, processed/, run_index.json, latest.json).
    #[arg(long)]
    pub outdir: PathBuf,

    /// Engine config JSON; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Explicit run id (discovered from the index when omitted).
    #[arg(long)]
    pub run_id: Option<String>,

    /// Restart from this stage (honors the hash guard unless --force).
    #[arg(long, value_name = "STAGE")]
    pub resume_from: Option<String>,

    /// Ignore previous state and start fresh.
    #[arg(long)]
    pub no_resume: bool,

    /// Override the input-hash guard when resuming.
    #[arg(long)]
    pub force: bool,

    /// Worker count (autotuned when omitted).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Items per executor chunk (fixed default when omitted).
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Override for the stage-state file location.
    #[arg(long)]
    pub state_path: Option<PathBuf>,

    /// Run classification recorded in the index.
    #[arg(long, default_value = "dev")]
    pub run_type: String,
}

#[derive(Debug, Subcommand)]
pub enum RunsCommand {
    /// List every run in the index.
    List {
        #[arg(long)]
        outdir: PathBuf,
    },
    /// Show the latest pointer.
    Latest {
        #[arg(long)]
        outdir: PathBuf,
    },
    /// Delete old runs down to the retention target.
    Cleanup {
        #[arg(long)]
        outdir: PathBuf,
        /// Runs to keep (defaults to the configured retention).
        #[arg(long)]
        keep: Option<usize>,
        /// Actually delete; without this the command is a dry run.
        #[arg(long)]
        apply: bool,
        /// Permit deleting runs still marked running.
        #[arg(long)]
        allow_delete_running: bool,
        /// Cross the keep_at_least floor.
        #[arg(long)]
        override_floor: bool,
        /// Engine config JSON (for the retention policy).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Report orphan directories and stale index entries.
    Reconcile {
        #[arg(long)]
        outdir: PathBuf,
    },
    /// Print the per-group stats table of a run (defaults to latest).
    Stats {
        #[arg(long)]
        outdir: PathBuf,
        #[arg(long)]
        run_id: Option<String>,
    },
}

/// A validated run request.
#[derive(Debug)]
pub struct ValidatedRun {
    pub args: RunArgs,
    pub run_id: Option<RunId>,
    pub resume_from: Option<StageName>,
    pub run_type: RunType,
}

#[derive(Debug)]
pub struct CliError(pub String);

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Semantic validation beyond clap's syntax checks.
pub fn validate_run(args: RunArgs) -> Result<ValidatedRun, CliError> {
    let run_id = match &args.run_id {
        None => None,
        Some(raw) => Some(
            raw.parse::<RunId>()
                .map_err(|e| CliError(format!("--run-id: {e}")))?,
        ),
    };
    let resume_from = match &args.resume_from {
        None => None,
        Some(raw) => Some(
            raw.parse::<StageName>()
                .map_err(|e| CliError(format!("--resume-from: {e}")))?,
        ),
    };
    let run_type = args
        .run_type
        .parse::<RunType>()
        .map_err(|_| CliError(format!("--run-type must be dev|test|prod, got {:?}", args.run_type)))?;
    if args.workers == Some(0) {
        return Err(CliError("--workers must be at least 1".into()));
    }
    if args.chunk_size == Some(0) {
        return Err(CliError("--chunk-size must be at least 1".into()));
    }
    if args.no_resume && args.resume_from.is_some() {
        return Err(CliError("--no-resume and --resume-from are mutually exclusive".into()));
    }
    Ok(ValidatedRun { run_id, resume_from, run_type, args })
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn clap_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["dedupe", "run", "--input", "in.csv", "--outdir", "out"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Run(a) => a,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn validates_stage_and_type() {
        let ok = validate_run(run_args(&["--resume-from", "grouping", "--run-type", "prod"]))
            .unwrap();
        assert_eq!(ok.resume_from, Some(StageName::Grouping));
        assert_eq!(ok.run_type, RunType::Prod);

        assert!(validate_run(run_args(&["--resume-from", "glooping"])).is_err());
        assert!(validate_run(run_args(&["--run-type", "qa"])).is_err());
        assert!(validate_run(run_args(&["--workers", "0"])).is_err());
        assert!(validate_run(run_args(&["--no-resume", "--resume-from", "grouping"])).is_err());
    }
}

// crates/dedupe_cli/src/main.rs
//
// DEDUPE-ENGINE v0 — CLI entrypoint
// Drives the fixed pipeline end-to-end and exposes run-store maintenance.
// Strictly offline; the only nondeterminism in a run is wall-clock
// metadata (timestamps, perf), never artifact content.
//
// Exit policy: 0 success, 1 config/schema/stage failures, 2 hash-guard
// refusal, 130 interrupted.

mod args;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use args::{validate_run, Cli, Command, RunsCommand};
use clap::Parser;
use dedupe_io::loaders;
use dedupe_io::run_store::RunStore;
use dedupe_pipeline::{run_pipeline, PipelineError, RunOptions};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // DEDUPE_LOG wins; RUST_LOG works too; default keeps stage logs on.
    let filter = EnvFilter::try_from_env("DEDUPE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("dedupe: error: {msg}");
            ExitCode::from(1)
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode, String> {
    match cli.command {
        Command::Run(run_args) => run_command(run_args, cli.quiet),
        Command::Runs { command } => runs_command(command, cli.quiet),
    }
}

fn run_command(raw: args::RunArgs, quiet: bool) -> Result<ExitCode, String> {
    let validated = validate_run(raw).map_err(|e| e.to_string())?;

    // Ctrl-C sets the shared stop flag; in-flight chunks finish, the
    // current stage is marked interrupted, and a later invocation resumes.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .map_err(|e| format!("signal handler: {e}"))?;
    }

    let opts = RunOptions {
        input_path: validated.args.input.clone(),
        outdir: validated.args.outdir.clone(),
        config_path: validated.args.config.clone(),
        run_id: validated.run_id.clone(),
        resume_from: validated.resume_from,
        no_resume: validated.args.no_resume,
        force: validated.args.force,
        workers: validated.args.workers,
        chunk_size: validated.args.chunk_size,
        state_path: validated.args.state_path.clone(),
        run_type: validated.run_type,
        stop,
        cmdline: std::env::args().collect::<Vec<_>>().join(" "),
    };

    match run_pipeline(&opts) {
        Ok(outs) => {
            if !quiet {
                println!("dedupe: completed — run_id={}", outs.run_id);
                println!(
                    "dedupe: resume_reason={} stages_executed={}",
                    outs.resume_reason, outs.stages_executed
                );
                println!("dedupe: review output at {}", outs.review_ready.display());
            }
            Ok(ExitCode::from(0))
        }
        Err(err) => {
            eprintln!("dedupe: error: {err}");
            Ok(exit_for(&err))
        }
    }
}

fn exit_for(err: &PipelineError) -> ExitCode {
    match err {
        PipelineError::HashMismatch { .. } => ExitCode::from(2),
        PipelineError::Interrupted { .. } => ExitCode::from(130),
        _ => ExitCode::from(1),
    }
}

fn runs_command(command: RunsCommand, quiet: bool) -> Result<ExitCode, String> {
    match command {
        RunsCommand::List { outdir } => {
            let store = RunStore::new(&outdir);
            let index = store.load_index().map_err(|e| e.to_string())?;
            if index.is_empty() {
                if !quiet {
                    println!("dedupe: no runs");
                }
                return Ok(ExitCode::from(0));
            }
            for (run_id, rec) in &index {
                println!(
                    "{run_id}  {}  {}  {}",
                    rec.status.as_str(),
                    rec.created_utc,
                    rec.input_path
                );
            }
            Ok(ExitCode::from(0))
        }
        RunsCommand::Latest { outdir } => {
            let store = RunStore::new(&outdir);
            match store.latest().map_err(|e| e.to_string())? {
                Some(p) => match p.run_id {
                    Some(id) => println!("{id}"),
                    None => println!("dedupe: empty state (no complete runs)"),
                },
                None => println!("dedupe: no runs"),
            }
            Ok(ExitCode::from(0))
        }
        RunsCommand::Cleanup { outdir, keep, apply, allow_delete_running, override_floor, config } => {
            let cfg = loaders::load_config(config.as_deref()).map_err(|e| e.to_string())?;
            let keep = keep.unwrap_or(cfg.run.keep_runs);
            let store = RunStore::new(&outdir);
            let report = store
                .cleanup(
                    keep,
                    cfg.run.keep_at_least,
                    apply,
                    allow_delete_running,
                    override_floor,
                    cfg.run.allow_empty_state,
                )
                .map_err(|e| e.to_string())?;
            if !quiet {
                let mode = if apply { "deleted" } else { "would delete" };
                for run_id in &report.deleted {
                    println!("dedupe: {mode} {run_id}");
                }
                for run_id in &report.skipped_running {
                    println!("dedupe: skipped running {run_id}");
                }
                println!("dedupe: kept {}", report.kept);
                if !apply {
                    println!("dedupe: dry run; pass --apply to delete");
                }
            }
            Ok(ExitCode::from(0))
        }
        RunsCommand::Stats { outdir, run_id } => {
            let reader = dedupe_report::ReviewReader::new(&outdir);
            let run = reader.resolve_run(run_id.as_deref()).map_err(|e| e.to_string())?;
            let stats = reader.group_stats(&run).map_err(|e| e.to_string())?;
            if !quiet {
                println!("dedupe: run {run} — {} groups", stats.len());
            }
            for row in &stats {
                println!(
                    "{}  size={}  max_score={}  {}  {}",
                    row.group_id,
                    row.group_size,
                    dedupe_core::score::centi_to_string(row.max_score),
                    row.disposition.as_str(),
                    row.primary_name
                );
            }
            Ok(ExitCode::from(0))
        }
        RunsCommand::Reconcile { outdir } => {
            let store = RunStore::new(&outdir);
            let findings = store.reconcile().map_err(|e| e.to_string())?;
            if findings.is_empty() {
                if !quiet {
                    println!("dedupe: store is consistent");
                }
            } else {
                for f in &findings {
                    println!("{}  {}", f.reason, f.run_id);
                }
            }
            Ok(ExitCode::from(0))
        }
    }
}

//! dedupe_pipeline — Deterministic orchestration of the dedupe engine.
//!
//! The fixed stage plan runs under per-stage state with atomic
//! persistence, smart auto-resume with reason-coded decisions, and a
//! chunked parallel executor whose merges are bit-stable for any worker
//! count. Stage drivers are artifact→artifact functions; all engine
//! semantics live in `dedupe_match`.

pub mod executor;
pub mod plan;
pub mod stages;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dedupe_core::entities::{
    ResumeReason, RunRecord, RunStatus, RunType, StageName,
};
use dedupe_core::ids::RunId;
use dedupe_io::artifacts::{self, RunPaths};
use dedupe_io::canonical_json::to_canonical_bytes;
use dedupe_io::clock::{now_stamp14, now_utc};
use dedupe_io::hasher;
use dedupe_io::loaders;
use dedupe_io::run_store::RunStore;
use dedupe_io::state::{load_state, save_state};
use dedupe_io::write_bytes_atomically;
use dedupe_io::IoError;

use executor::Executor;
use plan::{smart_resume, ResumeFlags};
use stages::StageContext;

/// Version tag of the fixed stage plan; recorded in state and meta.
pub const DAG_VERSION: &str = "v0";

/// Pipeline error taxonomy. Fatal errors bubble to the CLI entry, are
/// logged with their reason, and map onto the exit-code policy.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("input hash mismatch (stored {stored}, current {current}); rerun without --resume-from or pass --force")]
    HashMismatch { stored: String, current: String },
    #[error("stage {stage} failed: {message}")]
    StageFailed { stage: StageName, message: String },
    #[error("interrupted during {stage}; state saved, resume is seamless")]
    Interrupted { stage: StageName },
}

/// Entry-point options (the contract consumed by the CLI collaborator).
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub input_path: PathBuf,
    pub outdir: PathBuf,
    pub config_path: Option<PathBuf>,
    /// Explicit run id; discovered from the run index when absent.
    pub run_id: Option<RunId>,
    pub resume_from: Option<StageName>,
    pub no_resume: bool,
    pub force: bool,
    pub workers: Option<usize>,
    pub chunk_size: Option<usize>,
    /// Override for the stage-state file (defaults to
    /// `interim/{run_id}/pipeline_state.json`).
    pub state_path: Option<PathBuf>,
    pub run_type: RunType,
    /// Shared stop flag (signal handlers set it; chunk boundaries poll it).
    pub stop: Arc<AtomicBool>,
    /// Echo of the invoking command line, recorded in state.
    pub cmdline: String,
}

impl RunOptions {
    pub fn new(input_path: &Path, outdir: &Path) -> Self {
        RunOptions {
            input_path: input_path.to_path_buf(),
            outdir: outdir.to_path_buf(),
            config_path: None,
            run_id: None,
            resume_from: None,
            no_resume: false,
            force: false,
            workers: None,
            chunk_size: None,
            state_path: None,
            run_type: RunType::Dev,
            stop: Arc::new(AtomicBool::new(false)),
            cmdline: String::new(),
        }
    }
}

/// What a completed run hands back.
#[derive(Clone, Debug)]
pub struct PipelineOutputs {
    pub run_id: RunId,
    pub review_ready: PathBuf,
    pub resume_reason: ResumeReason,
    pub stages_executed: usize,
    pub stage_seconds: Vec<(StageName, f64)>,
}

/// Run the pipeline end-to-end (or resume it). See `RunOptions` for the
/// flag semantics; exit-code mapping lives in the CLI.
pub fn run_pipeline(opts: &RunOptions) -> Result<PipelineOutputs, PipelineError> {
    // Config + hashes; fatal before any stage runs.
    let config = loaders::load_config(opts.config_path.as_deref())?;
    let input_hash = hasher::input_hash(&opts.input_path)?;
    let config_hash = hasher::config_hash(&config)?;

    let store = RunStore::new(&opts.outdir);
    let (run_id, prior_hash_mismatch) = match &opts.run_id {
        Some(id) => (id.clone(), false),
        None => discover_run_id(&store, &input_hash, &config_hash, opts.force)?,
    };
    let paths = RunPaths::new(&opts.outdir, run_id.as_str());
    std::fs::create_dir_all(paths.interim_dir()).map_err(IoError::Write)?;
    std::fs::create_dir_all(paths.processed_dir()).map_err(IoError::Write)?;

    // Index entry first: a crash after this point still leaves a record.
    let created_utc = store
        .load_index()?
        .get(run_id.as_str())
        .map(|r| r.created_utc.clone())
        .unwrap_or_else(now_utc);
    store.upsert_run(&RunRecord {
        run_id: run_id.clone(),
        input_hash: input_hash.clone(),
        config_hash: config_hash.clone(),
        input_path: opts.input_path.display().to_string(),
        config_path: opts
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        created_utc,
        status: RunStatus::Running,
        run_type: opts.run_type,
    })?;

    // Resume decision.
    let state_path = opts.state_path.clone().unwrap_or_else(|| paths.state_path());
    let loaded = load_state(&state_path)?;
    let flags = ResumeFlags {
        no_resume: opts.no_resume,
        force: opts.force,
        resume_from: opts.resume_from,
        prior_hash_mismatch,
    };
    let decision = smart_resume(
        loaded,
        &input_hash,
        DAG_VERSION,
        &opts.cmdline,
        &now_utc(),
        flags,
        &paths,
    )
    .map_err(|v| PipelineError::HashMismatch { stored: v.stored, current: v.current })?;
    tracing::info!(
        run_id = %run_id,
        reason = %decision.reason,
        start = decision.start.map(|s| s.as_str()).unwrap_or("none"),
        "resume decision"
    );

    let mut state = decision.state;
    save_state(&state_path, &state)?;

    let Some(start) = decision.start else {
        // Everything complete and intact; nothing to execute.
        store.set_status(run_id.as_str(), RunStatus::Complete)?;
        return Ok(PipelineOutputs {
            run_id,
            review_ready: paths.processed(artifacts::REVIEW_READY),
            resume_reason: decision.reason,
            stages_executed: 0,
            stage_seconds: Vec::new(),
        });
    };

    // Executor + stage context.
    let exec = Executor::from_config(&config.parallelism, opts.workers, opts.chunk_size)
        .map_err(PipelineError::Config)?;
    let sim = config.similarity.resolve().map_err(|e| PipelineError::Config(e.to_string()))?;
    let seed = u64::from_str_radix(&input_hash[..16], 16).unwrap_or(0);
    let ctx = StageContext {
        paths: &paths,
        config: &config,
        sim,
        input_path: &opts.input_path,
        input_hash: &input_hash,
        config_hash: &config_hash,
        run_id: &run_id,
        run_type: opts.run_type,
        seed,
        executor: &exec,
        stop: &opts.stop,
    };
    tracing::info!(workers = exec.workers(), chunk_size = exec.chunk_size(), "executor ready");

    // Stage loop.
    let mut stage_seconds: Vec<(StageName, f64)> = Vec::new();
    for stage in StageName::ALL.iter().filter(|s| s.ordinal() >= start.ordinal()) {
        if opts.stop.load(Ordering::SeqCst) {
            plan::mark_interrupted(&mut state, *stage, &now_utc());
            save_state(&state_path, &state)?;
            store.set_status(run_id.as_str(), RunStatus::Interrupted)?;
            return Err(PipelineError::Interrupted { stage: *stage });
        }

        tracing::info!(stage = %stage, "stage start");
        plan::mark_start(&mut state, *stage, &now_utc());
        save_state(&state_path, &state)?;

        let began = Instant::now();
        let result = dispatch(*stage, &ctx);
        let elapsed = began.elapsed().as_secs_f64();

        match result {
            Ok(written) => {
                plan::mark_complete(&mut state, *stage, written, &now_utc());
                save_state(&state_path, &state)?;
                stage_seconds.push((*stage, elapsed));
                tracing::info!(stage = %stage, seconds = elapsed, "stage complete");
            }
            Err(PipelineError::Interrupted { .. }) => {
                plan::mark_interrupted(&mut state, *stage, &now_utc());
                save_state(&state_path, &state)?;
                store.set_status(run_id.as_str(), RunStatus::Interrupted)?;
                tracing::warn!(stage = %stage, "interrupted; in-flight chunks drained");
                return Err(PipelineError::Interrupted { stage: *stage });
            }
            Err(err) => {
                // Partial artifacts stay on disk for post-mortem.
                plan::mark_failed(&mut state, *stage, &err.to_string(), &now_utc());
                save_state(&state_path, &state)?;
                store.set_status(run_id.as_str(), RunStatus::Failed)?;
                tracing::error!(stage = %stage, error = %err, "stage failed");
                return Err(err);
            }
        }
    }

    // Perf summary is written once the plan has finished; it is the one
    // artifact outside the byte-determinism contract (wall times).
    write_perf_summary(&paths, &run_id, &stage_seconds)?;
    let final_rec = state.stage_mut(StageName::FinalOutput);
    if !final_rec.artifacts_written.iter().any(|a| a.ends_with(artifacts::PERF_SUMMARY)) {
        final_rec.artifacts_written.push(format!("processed/{}", artifacts::PERF_SUMMARY));
    }
    save_state(&state_path, &state)?;
    store.set_status(run_id.as_str(), RunStatus::Complete)?;
    tracing::info!(run_id = %run_id, "run complete");

    Ok(PipelineOutputs {
        run_id,
        review_ready: paths.processed(artifacts::REVIEW_READY),
        resume_reason: decision.reason,
        stages_executed: stage_seconds.len(),
        stage_seconds,
    })
}

/// Pick the run to operate on. The newest prior run is the comparison
/// point for the hash guard:
/// - its hashes match the current input/config → reuse it (resume);
/// - they differ and `--force` is set → reuse it anyway (the plan layer
///   logs FORCE_OVERRIDE);
/// - they differ otherwise → mint a fresh run id and leave the prior
///   artifacts untouched; the fresh start carries HASH_MISMATCH.
fn discover_run_id(
    store: &RunStore,
    input_hash: &str,
    config_hash: &str,
    force: bool,
) -> Result<(RunId, bool), IoError> {
    let index = store.load_index()?;
    let prior = index
        .values()
        .max_by(|a, b| {
            (a.created_utc.as_str(), a.run_id.as_str())
                .cmp(&(b.created_utc.as_str(), b.run_id.as_str()))
        });
    match prior {
        Some(r) if r.input_hash == input_hash && r.config_hash == config_hash => {
            Ok((r.run_id.clone(), false))
        }
        Some(r) if force => Ok((r.run_id.clone(), false)),
        Some(_) => {
            let fresh = RunId::new(&input_hash[..8], &config_hash[..8], &now_stamp14())
                .map_err(|e| IoError::Index(e.to_string()))?;
            Ok((fresh, true))
        }
        None => {
            let fresh = RunId::new(&input_hash[..8], &config_hash[..8], &now_stamp14())
                .map_err(|e| IoError::Index(e.to_string()))?;
            Ok((fresh, false))
        }
    }
}

fn dispatch(stage: StageName, ctx: &StageContext<'_>) -> Result<Vec<String>, PipelineError> {
    match stage {
        StageName::Normalization => stages::normalize::run(ctx),
        StageName::Filtering => stages::filter::run(ctx),
        StageName::ExactEquals => stages::exact_equals::run(ctx),
        StageName::CandidateGeneration => stages::candidates::run(ctx),
        StageName::Grouping => stages::group::run(ctx),
        StageName::Survivorship => stages::survivorship::run(ctx),
        StageName::Disposition => stages::disposition::run(ctx),
        StageName::AliasMatching => stages::alias::run(ctx),
        StageName::FinalOutput => stages::output::run(ctx),
    }
}

fn write_perf_summary(
    paths: &RunPaths,
    run_id: &RunId,
    stage_seconds: &[(StageName, f64)],
) -> Result<(), PipelineError> {
    let doc = serde_json::json!({
        "run_id": run_id.as_str(),
        "dag_version": DAG_VERSION,
        "generated_utc": now_utc(),
        "stages": stage_seconds
            .iter()
            .map(|(stage, secs)| serde_json::json!({ "stage": stage.as_str(), "seconds": secs }))
            .collect::<Vec<_>>(),
        "total_seconds": stage_seconds.iter().map(|(_, s)| s).sum::<f64>(),
    });
    write_bytes_atomically(
        &paths.processed(artifacts::PERF_SUMMARY),
        &to_canonical_bytes(&doc)?,
    )?;
    Ok(())
}

//! crates/dedupe_pipeline/src/plan.rs
//! The mini-DAG plan: stage-state transitions and the smart auto-resume
//! decision. Every branch lands on exactly one reason code from the
//! closed enumeration; the caller logs it.

use dedupe_core::entities::{
    PipelineState, ResumeReason, StageName, StageRecord, StageStatus,
};
use dedupe_io::artifacts::RunPaths;
use dedupe_io::state::StateLoad;

/// What the orchestrator should do after inspecting prior state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeDecision {
    /// The state to run under (fresh or carried forward).
    pub state: PipelineState,
    /// First stage to execute; `None` when everything is already complete
    /// and intact.
    pub start: Option<StageName>,
    pub reason: ResumeReason,
}

/// Flags lifted from the CLI surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResumeFlags {
    pub no_resume: bool,
    pub force: bool,
    pub resume_from: Option<StageName>,
    /// Run discovery found prior runs, but none matching the current
    /// input/config hashes: the fresh start is a guard decision, not a
    /// first run.
    pub prior_hash_mismatch: bool,
}

/// Stored-vs-current hash conflict that only `--force` may override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashGuardViolation {
    pub stored: String,
    pub current: String,
}

/// Decide where to (re)start. The hash guard applies to any carried-over
/// state; `--no-resume` wins over everything; `--resume-from` overrides
/// auto-detection but still honors the guard unless `--force`.
pub fn smart_resume(
    loaded: StateLoad,
    current_input_hash: &str,
    dag_version: &str,
    cmdline: &str,
    now_utc: &str,
    flags: ResumeFlags,
    paths: &RunPaths,
) -> Result<ResumeDecision, HashGuardViolation> {
    let fresh = || PipelineState::fresh(current_input_hash, dag_version, cmdline, now_utc);

    if flags.no_resume {
        return Ok(ResumeDecision {
            state: fresh(),
            start: Some(StageName::Normalization),
            reason: ResumeReason::ManualOverride,
        });
    }

    let mut state = match loaded {
        StateLoad::Absent => {
            let reason = if flags.prior_hash_mismatch {
                ResumeReason::HashMismatch
            } else {
                ResumeReason::NoPreviousRun
            };
            return Ok(ResumeDecision {
                state: fresh(),
                start: Some(StageName::Normalization),
                reason,
            });
        }
        StateLoad::Corrupt => {
            return Ok(ResumeDecision {
                state: fresh(),
                start: Some(StageName::Normalization),
                reason: ResumeReason::StateCorruptReset,
            });
        }
        StateLoad::Loaded(state) => state,
    };

    // Hash guard.
    let mut reason = ResumeReason::SmartDetect;
    if state.input_hash != current_input_hash {
        if flags.force {
            // Resume anyway; the state now tracks the current input.
            state.input_hash = current_input_hash.to_string();
            reason = ResumeReason::ForceOverride;
        } else if flags.resume_from.is_some() {
            // An explicit resume against changed input is refused.
            return Err(HashGuardViolation {
                stored: state.input_hash.clone(),
                current: current_input_hash.to_string(),
            });
        } else {
            return Ok(ResumeDecision {
                state: fresh(),
                start: Some(StageName::Normalization),
                reason: ResumeReason::HashMismatch,
            });
        }
    }

    if let Some(stage) = flags.resume_from {
        reset_from(&mut state, stage);
        return Ok(ResumeDecision {
            state,
            start: Some(stage),
            reason: ResumeReason::ManualOverride,
        });
    }

    // Auto-detect: highest complete stage whose artifacts all exist.
    for stage in StageName::ALL {
        let rec = state.stage(stage);
        if rec.status == StageStatus::Complete {
            if let Some(_missing) = first_missing_artifact(rec, paths) {
                reset_from(&mut state, stage);
                return Ok(ResumeDecision {
                    state,
                    start: Some(stage),
                    reason: ResumeReason::ArtifactMissing,
                });
            }
            continue;
        }
        // First non-complete stage: resume here. `running`/`failed`/
        // `interrupted` all count as incomplete. A force override stays
        // the headline reason; otherwise a mid-plan start is
        // NEXT_STAGE_READY.
        reset_from(&mut state, stage);
        let chosen = match reason {
            ResumeReason::SmartDetect if stage != StageName::Normalization => {
                ResumeReason::NextStageReady
            }
            other => other,
        };
        return Ok(ResumeDecision { state, start: Some(stage), reason: chosen });
    }

    // Everything complete and intact: nothing to execute.
    Ok(ResumeDecision { state, start: None, reason })
}

/// A complete stage with a missing declared artifact is incomplete.
fn first_missing_artifact(rec: &StageRecord, paths: &RunPaths) -> Option<String> {
    rec.artifacts_written
        .iter()
        .find(|name| !paths.resolve(name).exists())
        .cloned()
}

/// Re-open `stage` and everything after it.
fn reset_from(state: &mut PipelineState, stage: StageName) {
    for later in StageName::ALL.iter().filter(|s| s.ordinal() >= stage.ordinal()) {
        *state.stage_mut(*later) = StageRecord::pending(*later);
    }
}

/// Validate that the artifacts of every `complete` stage still exist;
/// returns the offenders (stage, artifact).
pub fn validate_artifacts(state: &PipelineState, paths: &RunPaths) -> Vec<(StageName, String)> {
    let mut missing = Vec::new();
    for rec in &state.stages {
        if rec.status == StageStatus::Complete {
            for name in &rec.artifacts_written {
                if !paths.resolve(name).exists() {
                    missing.push((rec.name, name.clone()));
                }
            }
        }
    }
    missing
}

// ------------------------------ transitions ------------------------------

/// Mark a stage running.
pub fn mark_start(state: &mut PipelineState, stage: StageName, now_utc: &str) {
    let rec = state.stage_mut(stage);
    rec.status = StageStatus::Running;
    rec.start_utc = Some(now_utc.to_string());
    rec.end_utc = None;
    rec.error = None;
    state.last_update_utc = now_utc.to_string();
}

/// Mark a stage complete with its declared artifacts.
pub fn mark_complete(
    state: &mut PipelineState,
    stage: StageName,
    artifacts: Vec<String>,
    now_utc: &str,
) {
    let rec = state.stage_mut(stage);
    rec.status = StageStatus::Complete;
    rec.end_utc = Some(now_utc.to_string());
    rec.artifacts_written = artifacts;
    state.last_update_utc = now_utc.to_string();
}

/// Mark a stage failed; partial artifacts stay on disk for post-mortem.
pub fn mark_failed(state: &mut PipelineState, stage: StageName, error: &str, now_utc: &str) {
    let rec = state.stage_mut(stage);
    rec.status = StageStatus::Failed;
    rec.end_utc = Some(now_utc.to_string());
    rec.error = Some(error.to_string());
    state.last_update_utc = now_utc.to_string();
}

/// Mark a stage interrupted; resume treats it as incomplete.
pub fn mark_interrupted(state: &mut PipelineState, stage: StageName, now_utc: &str) {
    let rec = state.stage_mut(stage);
    rec.status = StageStatus::Interrupted;
    rec.end_utc = Some(now_utc.to_string());
    state.last_update_utc = now_utc.to_string();
}

/// Highest complete stage, if any.
pub fn last_completed(state: &PipelineState) -> Option<StageName> {
    state
        .stages
        .iter()
        .rev()
        .find(|r| r.status == StageStatus::Complete)
        .map(|r| r.name)
}

// === Tests ===

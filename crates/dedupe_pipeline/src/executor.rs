//! crates/dedupe_pipeline/src/executor.rs
//! Chunked parallel map with a deterministic merge.
//!
//! Inputs are partitioned into fixed-size chunks; chunks run on a
//! dedicated rayon pool and results concatenate in input order, so output
//! is bit-identical for any worker count. The interrupt flag is polled at
//! chunk boundaries only: in-flight chunks finish, later chunks never
//! start. Chunk size is a constant default unless configured — it must not
//! depend on the worker count, or determinism would leak.

use std::sync::atomic::{AtomicBool, Ordering};

use dedupe_core::config::ParallelismCfg;
use rayon::prelude::*;

/// Default items per chunk when the config leaves it unset.
const DEFAULT_CHUNK_SIZE: usize = 2_048;

/// Raised when the stop flag halted scheduling before all chunks ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecInterrupted;

/// The chunked executor bound to one pipeline execution.
pub struct Executor {
    pool: Option<rayon::ThreadPool>,
    workers: usize,
    chunk_size: usize,
    small_input_threshold: usize,
}

impl Executor {
    /// Build from config with CLI overrides. Worker autotune reads the
    /// available CPU count; `backend = "serial"` skips pool creation
    /// entirely.
    pub fn from_config(
        cfg: &ParallelismCfg,
        workers_override: Option<usize>,
        chunk_override: Option<usize>,
    ) -> Result<Self, String> {
        let workers = workers_override
            .or(cfg.workers)
            .unwrap_or_else(|| num_cpus::get().max(1));
        let chunk_size = chunk_override.or(cfg.chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE).max(1);

        let pool = if cfg.backend == "serial" || workers <= 1 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| format!("thread pool: {e}"))?,
            )
        };
        Ok(Executor { pool, workers, chunk_size, small_input_threshold: cfg.small_input_threshold })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Map `f` over fixed-size chunks of `items`, concatenating results in
    /// input order. Small inputs run on the caller thread.
    pub fn map_chunks<T, R, F>(
        &self,
        items: &[T],
        stop: &AtomicBool,
        f: F,
    ) -> Result<Vec<R>, ExecInterrupted>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> Vec<R> + Sync,
    {
        let chunks: Vec<&[T]> = items.chunks(self.chunk_size).collect();

        let serial = self.pool.is_none() || items.len() < self.small_input_threshold;
        if serial {
            let mut out = Vec::new();
            for chunk in chunks {
                if stop.load(Ordering::SeqCst) {
                    return Err(ExecInterrupted);
                }
                out.extend(f(chunk));
            }
            return Ok(out);
        }

        // Each chunk checks the flag once before starting; a set flag
        // yields None and the whole map reports interruption after
        // in-flight chunks drain.
        let pool = self.pool.as_ref().unwrap_or_else(|| unreachable!("serial path handled above"));
        let results: Vec<Option<Vec<R>>> = pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| {
                    if stop.load(Ordering::SeqCst) {
                        None
                    } else {
                        Some(f(chunk))
                    }
                })
                .collect()
        });

        if results.iter().any(Option::is_none) {
            return Err(ExecInterrupted);
        }
        Ok(results.into_iter().flatten().flatten().collect())
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(workers: Option<usize>, chunk: Option<usize>, small: usize) -> ParallelismCfg {
        ParallelismCfg {
            workers,
            backend: "threads".into(),
            chunk_size: chunk,
            small_input_threshold: small,
        }
    }

    #[test]
    fn preserves_input_order() {
        let exec = Executor::from_config(&cfg(Some(4), Some(7), 0), None, None).unwrap();
        let items: Vec<u64> = (0..1_000).collect();
        let stop = AtomicBool::new(false);
        let out = exec.map_chunks(&items, &stop, |c| c.iter().map(|x| x * 2).collect()).unwrap();
        assert_eq!(out, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn identical_across_worker_counts() {
        let items: Vec<u64> = (0..5_000).collect();
        let stop = AtomicBool::new(false);
        let run = |workers: usize| {
            let exec = Executor::from_config(&cfg(Some(workers), Some(64), 0), None, None).unwrap();
            exec.map_chunks(&items, &stop, |c| c.iter().map(|x| x.wrapping_mul(31)).collect())
                .unwrap()
        };
        assert_eq!(run(1), run(8));
    }

    #[test]
    fn small_inputs_run_serial() {
        let exec = Executor::from_config(&cfg(Some(8), None, 10_000), None, None).unwrap();
        let items: Vec<u64> = (0..100).collect();
        let stop = AtomicBool::new(false);
        let out = exec.map_chunks(&items, &stop, |c| c.to_vec()).unwrap();
        assert_eq!(out, items);
    }

    #[test]
    fn stop_flag_interrupts() {
        let exec = Executor::from_config(&cfg(Some(2), Some(10), 0), None, None).unwrap();
        let items: Vec<u64> = (0..1_000).collect();
        let stop = AtomicBool::new(true);
        assert_eq!(exec.map_chunks(&items, &stop, |c| c.to_vec()), Err(ExecInterrupted));
    }

    #[test]
    fn overrides_win() {
        let exec = Executor::from_config(&cfg(Some(2), Some(10), 0), Some(6), Some(99)).unwrap();
        assert_eq!(exec.workers(), 6);
        assert_eq!(exec.chunk_size(), 99);
    }
}

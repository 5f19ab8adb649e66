//! Offline solver benchmark; no network required.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::SolveError;
use crate::hash::{decimal, leading_zero_nibbles, sha1_bytes, DECIMAL_MAX};
use crate::solver::{PowSolverBuilder, MAX_DIFFICULTY};

/// Outcome of one benchmark solve.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub difficulty: u32,
    pub workers: usize,
    pub elapsed_ms: u128,
    pub attempts: u64,
    pub nonce: String,
}

impl BenchReport {
    /// Probe rate in attempts per second.
    pub fn rate(&self) -> f64 {
        self.attempts as f64 * 1000.0 / self.elapsed_ms.max(1) as f64
    }
}

/// Time the parallel prefix-reusing solver on one difficulty.
pub fn run_parallel(
    authdata: &[u8],
    difficulty: u32,
    workers: usize,
) -> Result<BenchReport, SolveError> {
    let progress = Arc::new(AtomicU64::new(0));
    let solver = PowSolverBuilder::default()
        .workers(workers)
        .progress(progress.clone())
        .build_validated()?;

    let start = Instant::now();
    let nonce = solver.solve(authdata, difficulty)?;
    Ok(BenchReport {
        difficulty,
        workers,
        elapsed_ms: start.elapsed().as_millis(),
        attempts: progress.load(Ordering::Relaxed),
        nonce,
    })
}

/// Single-threaded baseline that rehashes the full `authdata || nonce`
/// concatenation on every probe, for comparison against the prefix-reusing
/// solver.
pub fn run_naive(authdata: &[u8], difficulty: u32) -> Result<BenchReport, SolveError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(SolveError::InvalidDifficulty(difficulty));
    }

    let start = Instant::now();
    let mut buf = [0u8; DECIMAL_MAX];
    let mut input = Vec::with_capacity(authdata.len() + DECIMAL_MAX);
    let mut nonce: u64 = 0;

    loop {
        input.clear();
        input.extend_from_slice(authdata);
        input.extend_from_slice(decimal(nonce, &mut buf));
        if leading_zero_nibbles(&sha1_bytes(&input), difficulty) {
            return Ok(BenchReport {
                difficulty,
                workers: 1,
                elapsed_ms: start.elapsed().as_millis(),
                attempts: nonce + 1,
                nonce: nonce.to_string(),
            });
        }
        nonce = nonce.checked_add(1).ok_or(SolveError::Exhausted)?;
    }
}

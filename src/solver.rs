//! Parallel brute-force search for a proof-of-work nonce.
//!
//! Worker `i` of `W` probes the nonce lattice `i`, `i + W`, `i + 2W`, ...
//! so every 64-bit value is inspected by exactly one worker and no shared
//! counter is needed. The first worker to hit the difficulty target
//! publishes its nonce through [`FirstHit`] and the rest stop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use derive_builder::Builder;
use tracing::debug;

use crate::error::SolveError;
use crate::hash::{decimal, leading_zero_nibbles, Sha1Prefix, DECIMAL_MAX};

/// Highest accepted difficulty: a SHA-1 digest has 40 hex nibbles.
pub const MAX_DIFFICULTY: u32 = 40;

/// Stop-flag reads are batched so the hot loop stays hash-bound while a
/// win is still observed within a few thousand probes.
const STOP_CHECK_INTERVAL: u64 = 4096;

/// Worker threads to use when the caller does not pick a count.
pub fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Reject difficulties beyond the 40 hex nibbles a SHA-1 digest offers.
pub fn check_difficulty(difficulty: u32) -> Result<(), SolveError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(SolveError::InvalidDifficulty(difficulty));
    }
    Ok(())
}

/// Winning nonce in decimal wire form, tagged with the worker that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Win {
    pub nonce: String,
    pub worker: usize,
}

/// First-writer-wins result slot shared by all workers.
///
/// The atomic gates the hot loop; publication happens under the mutex so
/// at most one worker ever writes the slot.
#[derive(Debug, Default)]
pub struct FirstHit {
    stop: AtomicBool,
    slot: Mutex<Option<Win>>,
}

impl FirstHit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether workers should stop probing.
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Publish a win unless another worker got there first.
    pub fn publish(&self, win: Win) -> bool {
        let mut slot = self.slot.lock().expect("result slot poisoned");
        if self.stop.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(win);
        self.stop.store(true, Ordering::Release);
        true
    }

    /// Stop the search without publishing.
    pub fn force_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Consume the slot once every worker has been joined.
    fn into_win(self) -> Option<Win> {
        self.slot.into_inner().expect("result slot poisoned")
    }
}

/// Parallel SHA-1 proof-of-work solver.
#[derive(Builder, Debug)]
#[builder(pattern = "owned")]
pub struct PowSolver {
    /// Worker thread count for the lattice search.
    #[builder(default = "default_workers()")]
    pub workers: usize,
    /// Total probes across all workers, flushed as each worker retires.
    #[builder(default)]
    pub progress: Arc<AtomicU64>,
}

impl PowSolverBuilder {
    fn validate(&self) -> Result<(), SolveError> {
        if self.workers == Some(0) {
            return Err(SolveError::InvalidConfig("workers must be >= 1".into()));
        }
        Ok(())
    }

    pub fn build_validated(self) -> Result<PowSolver, SolveError> {
        self.validate()?;
        self.build()
            .map_err(|e| SolveError::InvalidConfig(e.to_string()))
    }
}

impl PowSolver {
    /// Find a nonce whose decimal text appended to `authdata` hashes with
    /// at least `difficulty` leading zero hex nibbles, and return that
    /// decimal text.
    ///
    /// All workers are joined before this returns, on every path.
    pub fn solve(&self, authdata: &[u8], difficulty: u32) -> Result<String, SolveError> {
        check_difficulty(difficulty)?;
        self.progress.store(0, Ordering::SeqCst);
        if difficulty == 0 {
            return Ok("0".to_owned());
        }

        let prefix = Sha1Prefix::new(authdata);
        let hit = FirstHit::new();
        let workers = self.workers.max(1);

        thread::scope(|scope| {
            for worker in 0..workers {
                let prefix = &prefix;
                let hit = &hit;
                let progress = &self.progress;
                scope.spawn(move || {
                    search_lattice(prefix, difficulty, worker, workers, hit, progress)
                });
            }
        });

        match hit.into_win() {
            Some(win) => {
                debug!(worker = win.worker, nonce = %win.nonce, "proof-of-work solved");
                Ok(win.nonce)
            }
            None => Err(SolveError::Exhausted),
        }
    }
}

/// Probe nonces `start`, `start + stride`, ... until a win is published or
/// the lattice runs off the end of `u64`.
fn search_lattice(
    prefix: &Sha1Prefix,
    difficulty: u32,
    start: usize,
    stride: usize,
    hit: &FirstHit,
    progress: &AtomicU64,
) {
    let mut buf = [0u8; DECIMAL_MAX];
    let mut nonce = start as u64;
    let stride = stride as u64;
    let mut probes = 0u64;
    let mut since_check = 0u64;

    loop {
        let text = decimal(nonce, &mut buf);
        let digest = prefix.digest_with_suffix(text);
        probes += 1;

        if leading_zero_nibbles(&digest, difficulty) {
            hit.publish(Win {
                nonce: nonce.to_string(),
                worker: start,
            });
            break;
        }

        nonce = match nonce.checked_add(stride) {
            Some(next) => next,
            None => break,
        };

        since_check += 1;
        if since_check == STOP_CHECK_INTERVAL {
            since_check = 0;
            if hit.should_stop() {
                break;
            }
        }
    }

    progress.fetch_add(probes, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha1_bytes;

    fn solver(workers: usize) -> PowSolver {
        PowSolverBuilder::default()
            .workers(workers)
            .build_validated()
            .expect("build solver")
    }

    fn assert_valid(authdata: &[u8], nonce: &str, difficulty: u32) {
        let mut input = authdata.to_vec();
        input.extend_from_slice(nonce.as_bytes());
        assert!(
            leading_zero_nibbles(&sha1_bytes(&input), difficulty),
            "nonce {nonce} does not satisfy difficulty {difficulty}"
        );
    }

    #[test]
    fn zero_difficulty_returns_zero() {
        assert_eq!(solver(4).solve(b"abc", 0).expect("solve"), "0");
    }

    #[test]
    fn solved_nonce_satisfies_predicate() {
        let nonce = solver(4).solve(b"abc", 2).expect("solve");
        assert_valid(b"abc", &nonce, 2);
    }

    #[test]
    fn empty_authdata_is_legal() {
        let nonce = solver(2).solve(b"", 1).expect("solve");
        assert_valid(b"", &nonce, 1);
    }

    #[test]
    fn single_worker_is_deterministic() {
        let s = solver(1);
        let first = s.solve(b"deterministic", 1).expect("solve");
        let second = s.solve(b"deterministic", 1).expect("solve");
        assert_eq!(first, second);
        assert_valid(b"deterministic", &first, 1);
    }

    #[test]
    fn difficulty_bound_accepts_forty() {
        assert_eq!(check_difficulty(0), Ok(()));
        assert_eq!(check_difficulty(40), Ok(()));
        assert_eq!(check_difficulty(41), Err(SolveError::InvalidDifficulty(41)));
    }

    #[test]
    fn rejects_out_of_range_difficulty() {
        assert_eq!(
            solver(1).solve(b"abc", 41),
            Err(SolveError::InvalidDifficulty(41))
        );
    }

    #[test]
    fn progress_counts_probes() {
        let s = solver(2);
        let _ = s.solve(b"abc", 1).expect("solve");
        assert!(s.progress.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn builder_rejects_zero_workers() {
        let err = PowSolverBuilder::default()
            .workers(0)
            .build_validated()
            .expect_err("zero workers must be rejected");
        assert!(matches!(err, SolveError::InvalidConfig(_)));
    }

    #[test]
    fn first_hit_is_single_writer() {
        let hit = FirstHit::new();
        assert!(hit.publish(Win {
            nonce: "1".into(),
            worker: 0,
        }));
        assert!(!hit.publish(Win {
            nonce: "2".into(),
            worker: 1,
        }));
        assert!(hit.should_stop());
        let win = hit.into_win().expect("published win");
        assert_eq!(win.nonce, "1");
        assert_eq!(win.worker, 0);
    }

    #[test]
    fn force_stop_blocks_publication() {
        let hit = FirstHit::new();
        hit.force_stop();
        assert!(!hit.publish(Win {
            nonce: "1".into(),
            worker: 0,
        }));
        assert!(hit.into_win().is_none());
    }
}

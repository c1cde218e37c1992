//! Injectable randomness for every simulated outcome.
//!
//! All probabilities are phrased as "good outcome iff roll < p": a node is
//! online, accepts, a proof revalidates, a mint succeeds. `FixedRandom(0.0)`
//! therefore drives every component down its happy path and values close to
//! `1.0` down the unhappy one.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// Returns `true` with probability `p`.
    fn chance(&self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform integer in `[lo, hi]`. Returns `lo` when the range is empty.
    fn range_u64(&self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as f64;
        lo + ((self.next_f64() * span) as u64).min(hi - lo)
    }
}

/// Thread-local OS-seeded generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible generator for demo runs with a configured seed.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen::<f64>(),
            Err(poisoned) => poisoned.into_inner().gen::<f64>(),
        }
    }
}

/// Always returns the same roll.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Cycles through a scripted list of rolls.
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: AtomicUsize::new(0) }
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.values[i % self.values.len()]
    }
}

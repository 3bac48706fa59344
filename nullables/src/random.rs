//! Nullable random: scripted admission draws.

use std::sync::Mutex;
use vsolve_solver::RandomSource;

/// Returns pre-configured samples in order, cycling when exhausted.
pub struct NullRandom {
    samples: Vec<f64>,
    index: Mutex<usize>,
}

impl NullRandom {
    pub fn new(samples: Vec<f64>) -> Self {
        assert!(!samples.is_empty(), "NullRandom needs at least one sample");
        Self {
            samples,
            index: Mutex::new(0),
        }
    }

    /// Create with a single value that will be returned for every call.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of samples drawn so far.
    pub fn draws(&self) -> usize {
        *self.index.lock().unwrap()
    }
}

impl RandomSource for NullRandom {
    fn sample(&self) -> f64 {
        let mut idx = self.index.lock().unwrap();
        let value = self.samples[*idx % self.samples.len()];
        *idx += 1;
        value
    }
}

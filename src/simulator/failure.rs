//! Injected failure for the confirmation stage
//!
//! Failure is pseudo-random to imitate real-world network flakiness; no
//! actual validation is behind it. The trait keeps the roll injectable
//! so hosts and tests can pin the outcome.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides whether a confirmation attempt fails
pub trait FailureSource: Send + Sync {
    /// Roll once; `true` fails the attempt
    fn should_fail(&self) -> bool;
}

/// rand-backed source with a configurable failure probability
pub struct RandomFailure {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomFailure {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded variant; the same seed replays the same outcome sequence
    pub fn seeded(probability: f64, seed: u64) -> Self {
        Self {
            probability,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl FailureSource for RandomFailure {
    fn should_fail(&self) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen::<f64>() < self.probability
    }
}

/// Replays a fixed outcome script; rolls past the end never fail
pub struct ScriptedFailure {
    outcomes: Mutex<VecDeque<bool>>,
}

impl ScriptedFailure {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
        }
    }
}

impl FailureSource for ScriptedFailure {
    fn should_fail(&self) -> bool {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes.pop_front().unwrap_or(false)
    }
}

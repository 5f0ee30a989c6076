// File: testing-framework/src/orchestrator/mod.rs
//
// Orchestrator Module
//
// Deterministic infrastructure shared by every tier: an injectable clock and
// a seeded RNG, bundled as DeterministicTestEnv.

/// Clock abstractions for deterministic time control in tests
pub mod clock;
/// Deterministic random number generation for reproducible tests
pub mod rng;

use std::sync::Arc;

/// Complete deterministic test environment
///
/// Combines a Clock and a TestRng. Every run with the same seed draws the
/// same stored values and sees the same block timestamps.
///
/// ```rust,ignore
/// use storage_testing_framework::orchestrator::DeterministicTestEnv;
///
/// #[tokio::test(start_paused = true)]
/// async fn test_random_round_trip() {
///     let env = DeterministicTestEnv::new_time_paused();
///     let value: u64 = env.rng.gen();
///     // deploy, store(value), retrieve() ...
/// }
/// ```
pub struct DeterministicTestEnv {
    /// Clock for time control (SystemClock in real runs, PausedClock in tests)
    pub clock: Arc<dyn Clock>,

    /// Seeded RNG for reproducible randomness
    pub rng: TestRng,
}

impl DeterministicTestEnv {
    /// Create a new environment with time paused
    ///
    /// Must run inside `#[tokio::test(start_paused = true)]` or another
    /// current-thread runtime.
    pub fn new_time_paused() -> Self {
        Self {
            clock: Arc::new(clock::PausedClock::new()),
            rng: rng::TestRng::new_from_env_or_random(),
        }
    }

    /// Create environment with a specific seed and real time
    pub fn with_seed(seed: u64) -> Self {
        Self {
            clock: Arc::new(clock::SystemClock),
            rng: rng::TestRng::with_seed(seed),
        }
    }

    /// Create a new environment with paused time and specific seed
    pub fn new_time_paused_with_seed(seed: u64) -> Self {
        Self {
            clock: Arc::new(clock::PausedClock::new()),
            rng: rng::TestRng::with_seed(seed),
        }
    }

    /// Advance paused time by the specified duration
    pub async fn advance_time(&self, duration: tokio::time::Duration) {
        tokio::time::advance(duration).await
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Print failure message with replay instructions
    pub fn on_failure(&self) {
        eprintln!("❌ Test failed! Replay with:");
        eprintln!(
            "   {}=0x{:016x} cargo test ...",
            rng::SEED_ENV_VAR,
            self.rng.seed()
        );
    }
}

pub use clock::{Clock, PausedClock, SystemClock};
pub use rng::{TestRng, SEED_ENV_VAR};

// File: testing-framework/src/orchestrator/rng.rs
//
// Deterministic Random Number Generation
//
// Every random value a test draws (stored values, account picks) comes from a
// seeded generator. The seed is logged so a failing run can be replayed with
// STORAGE_TEST_SEED.

use parking_lot::Mutex;
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Environment variable holding a replay seed (decimal or `0x` hex)
pub const SEED_ENV_VAR: &str = "STORAGE_TEST_SEED";

/// Seeded RNG usable through a shared reference
pub struct TestRng {
    seed: u64,
    inner: Mutex<StdRng>,
}

impl TestRng {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seed from `STORAGE_TEST_SEED` if set and parseable, otherwise randomly
    pub fn new_from_env_or_random() -> Self {
        let seed = std::env::var(SEED_ENV_VAR)
            .ok()
            .and_then(|value| parse_seed(&value))
            .unwrap_or_else(|| {
                // Zero is reserved so a missing seed is never mistaken for one
                rand::thread_rng().gen_range(1..=u64::MAX)
            });

        log::info!("TestRng seed: 0x{:016x}", seed);
        log::info!("   Replay: {}=0x{:016x} cargo test ...", SEED_ENV_VAR, seed);

        Self::with_seed(seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn gen<T>(&self) -> T
    where
        Standard: Distribution<T>,
    {
        self.inner.lock().gen()
    }

    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.inner.lock().gen_range(range)
    }

    pub fn fill_bytes(&self, dest: &mut [u8]) {
        self.inner.lock().fill_bytes(dest)
    }
}

fn parse_seed(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(hex_digits) => u64::from_str_radix(hex_digits, 16).ok(),
        None => value.parse().ok(),
    }
}

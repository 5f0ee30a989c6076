//! # Storage Testing Framework
//!
//! Deterministic, in-process testing framework for smart contracts, built
//! around the store/retrieve round trip of a `SimpleStorage` contract.
//!
//! ## Architecture Overview
//!
//! - **Tier 1**: Component tests against `TestChain` (in-process, no RPC)
//! - **Tier 2**: Integration tests against `TestNode` through `ChainRpc`
//! - **Contract layer**: artifacts, registry, provider, typed handles
//! - **Round trip**: deploy → store → retrieve → verify, stage by stage
//! - **Suites and scenarios**: mocha-style suites and YAML scenarios on top
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storage_testing_framework::prelude::*;
//!
//! #[tokio::test]
//! async fn should_store_a_value() -> anyhow::Result<()> {
//!     let node = Arc::new(TestNodeBuilder::new().build().await?);
//!     let provider =
//!         ContractProvider::for_node(node, Arc::new(ContractRegistry::with_builtin())).await;
//!
//!     let storage = SimpleStorage::deploy(&provider).await?;
//!     storage.store(U256::from(10)).await?;
//!     RoundTripVerifier::verify_text("10", storage.retrieve().await?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Clock abstraction + seeded RNG
//! 2. **Fresh state**: every test case gets its own chain
//! 3. **Typed values**: 256-bit values are compared as `U256`, never as text
//! 4. **Bounded waits**: every send, call and confirmation has a timeout

#![warn(clippy::all)]

/// Contract ABI encoding and decoding
pub mod abi;

/// Harness configuration (chain parameters, timeouts, artifact directories)
pub mod config;

/// Contract artifacts, registry, provider and handles
pub mod contract;

/// Harness error taxonomy
pub mod error;

/// Core orchestration - provides Clock, RNG, deterministic environment
pub mod orchestrator;

/// Hashes, addresses and 256-bit integers
pub mod primitives;

/// Store/retrieve round-trip verification
pub mod roundtrip;

/// Mocha-style contract test suites
pub mod suite;

// Tier 1: Component-level testing (in-process, no RPC)
pub mod tier1_component;

/// Tier 2: Integration testing (single node + RPC)
pub mod tier2_integration;

/// Failure artifacts and replay
pub mod utilities;

// Core invariant checkers (nonce monotonicity, gas accounting)
pub mod invariants;

// DSL scenario parser and executor
pub mod scenarios;

// Convenient re-exports for common usage
pub mod prelude;

// Re-export commonly used types at crate root
pub use error::{Failure, HarnessError, HarnessResult};
pub use orchestrator::{Clock, DeterministicTestEnv, PausedClock, SystemClock, TestRng};
pub use tier1_component::{TestChain, TestChainBuilder};

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

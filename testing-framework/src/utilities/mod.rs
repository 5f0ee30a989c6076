// File: testing-framework/src/utilities/mod.rs
//
// Testing Utilities
//
// Failure artifacts: what a failed contract test saw, saved as JSON, and the
// helpers that load, check and print them.

/// Failure artifact collection for test debugging and reproduction
pub mod artifacts;

/// Artifact replay utilities for reproducing test failures
pub mod replay;

pub use artifacts::{
    ArtifactCollector, ChainStateSnapshot, ContractStateSnapshot, TestArtifact, TransactionRecord,
};
pub use replay::{get_replay_command, load_artifact, print_artifact_summary, validate_artifact};

// File: testing-framework/src/contract/mod.rs
//
// Contract Layer
//
// Build artifacts, the name → artifact registry, the provider that deploys
// fresh instances, and handles for calling them.

pub mod artifact;
pub mod instance;
pub mod provider;
pub mod registry;
pub mod simple_storage;

pub use artifact::ContractArtifact;
pub use instance::ContractInstance;
pub use provider::ContractProvider;
pub use registry::{simple_storage_artifact, ContractRegistry};
pub use simple_storage::SimpleStorage;

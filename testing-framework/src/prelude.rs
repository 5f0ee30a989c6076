//! Convenient re-exports for tests
//!
//! ```rust,ignore
//! use storage_testing_framework::prelude::*;
//! ```

pub use crate::abi::{ContractAbi, Function, StateMutability, Token};
pub use crate::config::HarnessConfig;
pub use crate::contract::{
    ContractArtifact, ContractInstance, ContractProvider, ContractRegistry, SimpleStorage,
};
pub use crate::error::{Failure, HarnessError, HarnessResult};
pub use crate::orchestrator::{Clock, DeterministicTestEnv, PausedClock, SystemClock, TestRng};
pub use crate::primitives::{Address, Hash, U256};
pub use crate::roundtrip::{parse_value, RoundTripReport, RoundTripStage, RoundTripVerifier};
pub use crate::suite::{builtin_simple_storage_suite, ContractSuite, SuiteContext, SuiteReport};
pub use crate::tier1_component::{TestChain, TestChainBuilder, TransactionReceipt};
pub use crate::tier2_integration::{ChainRpc, TestNode, TestNodeBuilder};

pub use futures::FutureExt;
pub use std::sync::Arc;
pub use std::time::Duration;

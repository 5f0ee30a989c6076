//! Tier 1: Component-level testing
//!
//! In-process contract chain without RPC. Deterministic, and fast enough to
//! spin up a fresh chain for every test.
//!
//! ## Key Features
//!
//! - Clock injection for block timestamps
//! - Native contract logic selected by bytecode hash
//! - Gas metering with per-block receipts
//! - Manual or automatic mining
//!
//! ## Example
//!
//! ```rust,ignore
//! use storage_testing_framework::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_deploy() {
//!     let chain = TestChainBuilder::new()
//!         .with_funded_account_count(2)
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     // Submit transactions here...
//! }
//! ```

mod builder;
mod chain;
pub mod runtime;

pub use builder::TestChainBuilder;
pub use chain::{
    AccountState, CallRequest, ChainError, ContractSnapshot, ReceiptStatus, TestBlock, TestChain,
    TestTransaction, TransactionReceipt, GENESIS_TIMESTAMP,
};
pub use runtime::{ContractLogic, ExecutionContext, ExecutionFault, GasMeter, LogicRegistry};

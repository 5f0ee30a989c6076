//! DSL scenario parser and executor
//!
//! Scenarios describe a contract test as YAML. Numbers are written as
//! strings (decimal or `0x` hex) so 256-bit values survive YAML parsing.
//!
//! ## Example Scenario
//!
//! ```yaml
//! name: "Simple storage round trip"
//! description: "alice stores 10, bob reads it back"
//! genesis:
//!   accounts:
//!     - alice
//!     - { name: bob, balance: "1000000000000000000" }
//!   balance: "100000000000000000000"
//!   auto_mine: true
//! steps:
//!   - action: deploy
//!     contract: SimpleStorage
//!     as: storage
//!   - action: store
//!     instance: storage
//!     value: "10"
//!     expect:
//!       status: success
//!   - action: call
//!     instance: storage
//!     function: retrieve
//!     eq: "10"
//!   - action: assert_block_number
//!     eq: 2
//! invariants:
//!   - nonce_monotonicity
//!   - gas_accounting
//! ```

pub mod executor;
pub mod parser;

pub use executor::{ExecutionReport, ScenarioExecutor};
pub use parser::{load_scenario, parse_scenario, Step, TestScenario};

//! Scenarios Demo
//!
//! Parses a YAML scenario, runs it on a fresh in-process chain and prints the
//! report, then shows how a malformed scenario is rejected before it runs.
//!
//! Run with: cargo run --example scenarios_demo

use anyhow::Result;
use storage_testing_framework::scenarios::{parse_scenario, ScenarioExecutor};

const ROUND_TRIP: &str = r#"
name: "Demo Round Trip"
description: "Store two values and read the last one back"

genesis:
  accounts:
    - alice
    - { name: bob, balance: "1000000000000000000" }

steps:
  - action: deploy
    contract: SimpleStorage
    as: storage
  - action: store
    instance: storage
    value: "10"
  - action: store
    instance: storage
    from: bob
    value: "0x2a"
  - action: retrieve
    instance: storage
    eq: "42"
  - action: assert_nonce
    account: bob
    eq: 1

invariants:
  - nonce_monotonicity
  - gas_accounting
"#;

const BROKEN: &str = r#"
name: "Broken"
genesis:
  accounts: [alice]
steps:
  - action: retrieve
    instance: storage
    eq: "0"
"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    println!("=== Storage Harness - Scenarios Demo ===\n");

    let scenario = parse_scenario(ROUND_TRIP)?;
    println!(
        "Parsed '{}' with {} accounts and {} steps\n",
        scenario.name,
        scenario.genesis.accounts.len(),
        scenario.steps.len()
    );

    let mut executor = ScenarioExecutor::new();
    let report = executor.execute(scenario).await?;
    report.print();

    match parse_scenario(BROKEN) {
        Ok(_) => println!("\n✗ Broken scenario was accepted"),
        Err(e) => println!("\n✓ Broken scenario rejected: {:#}", e),
    }

    Ok(())
}

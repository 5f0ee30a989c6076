// Example: Artifact Collection Demo
//
// Runs a round trip whose verification is made to fail, captures the chain
// state into a failure artifact, then loads, validates and prints it the way
// `storage-harness replay` does.

use anyhow::Result;
use storage_testing_framework::prelude::*;
use storage_testing_framework::utilities::{
    get_replay_command, load_artifact, print_artifact_summary, validate_artifact,
    ArtifactCollector,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║            Artifact Collection System Demo                     ║");
    println!("╚════════════════════════════════════════════════════════════════╝\n");

    println!("1. Starting an auto-mining node...");
    let node = Arc::new(TestNodeBuilder::new().with_funded_accounts(2).build().await?);
    let provider =
        ContractProvider::for_node(node.clone(), Arc::new(ContractRegistry::with_builtin())).await;
    let rng = TestRng::with_seed(0xa3f5c8e1b2d94706);

    println!("2. Storing a value and checking it against the wrong expectation...");
    let storage = SimpleStorage::deploy(&provider).await?;
    storage.store(U256::from(10u64)).await?;
    let retrieved = storage.retrieve().await?;
    let failure = RoundTripVerifier::verify(U256::from(11u64), retrieved)
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    println!("   ✓ Failure: {}", failure);

    println!("3. Collecting the artifact...");
    let mut collector = ArtifactCollector::new("should store a value");
    collector.set_rng_seed(rng.seed());
    collector.set_stage(RoundTripStage::Retrieved);
    collector.set_failure_reason(failure);
    collector.capture_log("ERROR", "retrieved value does not match");
    collector.capture_chain_state(node.chain()).await;

    let output_dir = tempfile::tempdir()?;
    let path = collector.save(output_dir.path()).await?;
    println!("   ✓ Saved to {}", path.display());

    println!("4. Loading and validating...");
    let artifact = load_artifact(&path).await?;
    validate_artifact(&artifact)?;
    println!("   ✓ Artifact is consistent\n");

    print_artifact_summary(&artifact);
    println!("\nReplay with: {}", get_replay_command(&artifact));

    Ok(())
}

// File: testing-framework/src/utilities/artifacts.rs
//
// Failure Artifact Collection System
//
// Captures what a failed contract test saw (chain state, contract storage,
// transactions and logs) so the failure can be inspected and replayed.

use crate::tier1_component::TestChain;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Chain state at the moment of failure
///
/// 256-bit quantities are decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStateSnapshot {
    pub block_number: u64,
    pub tip_hash: String,
    /// Account balances (address → wei)
    pub balances: BTreeMap<String, String>,
    /// Genesis balances (address → wei)
    pub genesis_balances: BTreeMap<String, String>,
    /// Fees paid (address → wei)
    pub gas_spent: BTreeMap<String, String>,
    /// Account nonces (address → nonce)
    pub nonces: BTreeMap<String, u64>,
    pub contracts: Vec<ContractStateSnapshot>,
}

/// Storage of one deployed contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStateSnapshot {
    pub address: String,
    pub name: String,
    pub code_hash: String,
    pub deployed_at: u64,
    /// Non-zero slots (slot → value)
    pub storage: BTreeMap<String, String>,
}

/// Transaction history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,
    /// `None` for contract creations
    pub to: Option<String>,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Function selector or `create`
    pub input: String,
    /// Block where the transaction was mined (if any)
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: Option<String>,
    pub fault: Option<String>,
}

/// Complete test failure artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestArtifact {
    pub metadata: TestMetadata,
    pub chain_state: Option<ChainStateSnapshot>,
    pub transactions: Vec<TransactionRecord>,
    pub logs: Vec<LogEntry>,
}

/// Test metadata for reproduction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestMetadata {
    pub test_name: String,
    /// RNG seed used (if available)
    pub rng_seed: Option<u64>,
    /// Timestamp when the test failed (RFC 3339)
    pub timestamp: String,
    pub duration_ms: u64,
    pub failure_reason: Option<String>,
    /// Last round-trip stage reached, when the test was a round trip
    #[serde(default)]
    pub stage: Option<String>,
}

/// Log entry captured during test execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub level: String,
    pub message: String,
    pub timestamp: String,
}

/// Artifact collector for capturing test failure state
///
/// # Examples
///
/// ```rust,ignore
/// let mut collector = ArtifactCollector::new("should_store_a_value");
/// collector.set_rng_seed(rng.seed());
///
/// if let Err(e) = run_case(&node).await {
///     collector.capture_chain_state(node.chain()).await;
///     collector.set_failure_reason(e.to_string());
///     collector.save("./artifacts/").await?;
/// }
/// ```
pub struct ArtifactCollector {
    metadata: TestMetadata,
    chain_state: Option<ChainStateSnapshot>,
    transactions: Vec<TransactionRecord>,
    logs: Vec<LogEntry>,
    start_time: std::time::Instant,
}

impl ArtifactCollector {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            metadata: TestMetadata {
                test_name: test_name.into(),
                rng_seed: None,
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_ms: 0,
                failure_reason: None,
                stage: None,
            },
            chain_state: None,
            transactions: Vec::new(),
            logs: Vec::new(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn set_rng_seed(&mut self, seed: u64) {
        self.metadata.rng_seed = Some(seed);
    }

    pub fn set_failure_reason(&mut self, reason: String) {
        self.metadata.failure_reason = Some(reason);
    }

    pub fn set_stage(&mut self, stage: impl ToString) {
        self.metadata.stage = Some(stage.to_string());
    }

    pub fn add_transaction(&mut self, tx: TransactionRecord) {
        self.transactions.push(tx);
    }

    pub fn capture_log(&mut self, level: impl Into<String>, message: impl Into<String>) {
        self.logs.push(LogEntry {
            level: level.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }

    /// Snapshot accounts, contracts and every submitted transaction of `chain`
    pub async fn capture_chain_state(&mut self, chain: &TestChain) {
        let tip = chain.latest_block().await;
        let mut snapshot = ChainStateSnapshot {
            block_number: tip.number,
            tip_hash: tip.hash.to_string(),
            ..Default::default()
        };

        for (address, account) in chain.accounts_kv().await {
            let key = address.to_string();
            snapshot
                .balances
                .insert(key.clone(), account.balance.to_string());
            snapshot.genesis_balances.insert(
                key.clone(),
                chain.genesis_balance(&address).await.to_string(),
            );
            snapshot
                .gas_spent
                .insert(key.clone(), chain.gas_spent(&address).await.to_string());
            snapshot.nonces.insert(key, account.nonce);
        }

        for contract in chain.contracts().await {
            snapshot.contracts.push(ContractStateSnapshot {
                address: contract.address.to_string(),
                name: contract.name,
                code_hash: contract.code_hash.to_string(),
                deployed_at: contract.deployed_at,
                storage: contract
                    .storage
                    .iter()
                    .map(|(slot, value)| (slot.to_string(), value.to_string()))
                    .collect(),
            });
        }
        self.chain_state = Some(snapshot);

        for (tx, receipt) in chain.transactions().await {
            let input = match (&tx.to, tx.data.get(..4)) {
                (None, _) => "create".to_string(),
                (Some(_), Some(selector)) => format!("0x{}", hex::encode(selector)),
                (Some(_), None) => format!("0x{}", hex::encode(&tx.data)),
            };
            self.transactions.push(TransactionRecord {
                hash: tx.hash().to_string(),
                from: tx.from.to_string(),
                to: tx.to.map(|to| to.to_string()),
                nonce: tx.nonce,
                gas_limit: tx.gas_limit,
                input,
                block_number: receipt.as_ref().map(|r| r.block_number),
                gas_used: receipt.as_ref().map(|r| r.gas_used),
                status: receipt.as_ref().map(|r| r.status.to_string()),
                fault: receipt
                    .as_ref()
                    .and_then(|r| r.fault.as_ref())
                    .map(|f| f.to_string()),
            });
        }
    }

    /// Write the artifact as pretty JSON into `output_dir`, returning its path
    pub async fn save(&mut self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.metadata.duration_ms = self.start_time.elapsed().as_millis() as u64;

        let artifact = self.artifact();

        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .await
            .context("Failed to create artifact directory")?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let filename = format!("{}_{}.json", file_stem(&self.metadata.test_name), timestamp);
        let filepath = output_dir.join(filename);

        let json =
            serde_json::to_string_pretty(&artifact).context("Failed to serialize artifact")?;

        let mut file = fs::File::create(&filepath)
            .await
            .context("Failed to create artifact file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write artifact data")?;
        file.flush()
            .await
            .context("Failed to flush artifact file")?;

        log::info!("Failure artifact saved to {}", filepath.display());
        Ok(filepath)
    }

    pub async fn load(filepath: impl AsRef<Path>) -> Result<TestArtifact> {
        let filepath = filepath.as_ref();
        let content = fs::read_to_string(filepath)
            .await
            .with_context(|| format!("Failed to read artifact file {}", filepath.display()))?;

        let artifact: TestArtifact =
            serde_json::from_str(&content).context("Failed to parse artifact JSON")?;

        Ok(artifact)
    }

    /// Artifact as collected so far
    pub fn artifact(&self) -> TestArtifact {
        TestArtifact {
            metadata: self.metadata.clone(),
            chain_state: self.chain_state.clone(),
            transactions: self.transactions.clone(),
            logs: self.logs.clone(),
        }
    }
}

// Test names contain spaces ("should store a value")
fn file_stem(test_name: &str) -> String {
    test_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Token;
    use crate::primitives::U256;
    use crate::tier1_component::runtime::simple_storage;
    use crate::tier1_component::{TestChainBuilder, TestTransaction};

    #[tokio::test]
    async fn test_artifact_collector_creation() {
        let collector = ArtifactCollector::new("test_example");
        assert_eq!(collector.metadata.test_name, "test_example");
        assert!(collector.metadata.rng_seed.is_none());
        assert!(collector.metadata.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_metadata_setters() {
        let mut collector = ArtifactCollector::new("test_example");
        collector.set_rng_seed(0x1234567890abcdef);
        collector.set_failure_reason("Assertion failed".to_string());
        collector.set_stage("STORED");
        collector.capture_log("ERROR", "Test error message");

        let artifact = collector.artifact();
        assert_eq!(artifact.metadata.rng_seed, Some(0x1234567890abcdef));
        assert_eq!(
            artifact.metadata.failure_reason.as_deref(),
            Some("Assertion failed")
        );
        assert_eq!(artifact.metadata.stage.as_deref(), Some("STORED"));
        assert_eq!(artifact.logs[0].level, "ERROR");
    }

    #[tokio::test]
    async fn test_capture_chain_state() {
        let chain = TestChainBuilder::new()
            .with_funded_account_count(2)
            .build()
            .await
            .unwrap();
        let alice = chain.accounts().await[0];

        let create = TestTransaction {
            from: alice,
            to: None,
            data: simple_storage::bytecode().to_vec(),
            gas_limit: 1_000_000,
            gas_price: 1,
            nonce: 0,
        };
        let hash = chain.submit_transaction(create).await.unwrap();
        let contract = chain.get_receipt(&hash).await.unwrap().contract_address.unwrap();
        let store = TestTransaction {
            from: alice,
            to: Some(contract),
            data: simple_storage::store_function()
                .encode_input(&[Token::Uint(U256::from(10u64))])
                .unwrap(),
            gas_limit: 100_000,
            gas_price: 1,
            nonce: 1,
        };
        chain.submit_transaction(store).await.unwrap();

        let mut collector = ArtifactCollector::new("capture");
        collector.capture_chain_state(&chain).await;
        let artifact = collector.artifact();

        let state = artifact.chain_state.unwrap();
        assert_eq!(state.block_number, 2);
        assert_eq!(state.nonces[&alice.to_string()], 2);
        assert_eq!(state.contracts.len(), 1);
        assert_eq!(state.contracts[0].storage["0"], "10");

        assert_eq!(artifact.transactions.len(), 2);
        assert_eq!(artifact.transactions[0].input, "create");
        assert_eq!(artifact.transactions[1].input, "0x6057361d");
        assert_eq!(
            artifact.transactions[1].status.as_deref(),
            Some("success")
        );
    }

    #[tokio::test]
    async fn test_save_and_load_artifact() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut collector = ArtifactCollector::new("should store a value");
        collector.set_rng_seed(0xdeadbeef);
        collector.set_failure_reason("Test failure".to_string());
        collector.capture_log("ERROR", "Test log");

        let filepath = collector.save(temp_dir.path()).await?;
        assert!(filepath.exists());
        let filename = filepath.file_name().unwrap().to_string_lossy().to_string();
        assert!(filename.starts_with("should_store_a_value_"));

        let loaded = ArtifactCollector::load(&filepath).await?;
        assert_eq!(loaded.metadata.test_name, "should store a value");
        assert_eq!(loaded.metadata.rng_seed, Some(0xdeadbeef));
        assert_eq!(loaded.logs.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let err = ArtifactCollector::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse artifact JSON"));
    }
}

//! Contract build artifacts
//!
//! JSON documents as emitted by Solidity build tools: a contract name, the
//! ABI array and `0x`-prefixed creation bytecode. Unknown fields (source maps,
//! compiler metadata, networks) are ignored.

use crate::abi::ContractAbi;
use crate::primitives::{keccak256, Hash};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: ContractAbi,
    #[serde(with = "hex_bytes")]
    pub bytecode: Vec<u8>,
}

impl ContractArtifact {
    pub fn new(contract_name: impl Into<String>, abi: ContractAbi, bytecode: Vec<u8>) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi,
            bytecode,
        }
    }

    /// Keccak-256 of the creation bytecode
    pub fn code_hash(&self) -> Hash {
        keccak256(&self.bytecode)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse contract artifact")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contract artifact {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("In {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize contract artifact")
    }
}

/// `0x`-prefixed hex encoding for byte vectors
mod hex_bytes {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'a, D: Deserializer<'a>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(digits).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::StateMutability;

    const ARTIFACT_JSON: &str = r#"{
        "contractName": "SimpleStorage",
        "abi": [
            {"inputs": [], "name": "retrieve", "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}], "stateMutability": "view", "type": "function"},
            {"inputs": [{"internalType": "uint256", "name": "num", "type": "uint256"}], "name": "store", "outputs": [], "stateMutability": "nonpayable", "type": "function"},
            {"anonymous": false, "inputs": [], "name": "Stored", "type": "event"}
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080",
        "compiler": {"name": "solc", "version": "0.8.19"}
    }"#;

    #[test]
    fn test_parse_build_artifact() {
        let artifact = ContractArtifact::from_json(ARTIFACT_JSON).unwrap();
        assert_eq!(artifact.contract_name, "SimpleStorage");
        assert_eq!(artifact.bytecode, vec![0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(artifact.abi.len(), 2);
        assert_eq!(
            artifact.abi.function("retrieve").unwrap().state_mutability,
            StateMutability::View
        );
    }

    #[test]
    fn test_json_written_back_is_readable() {
        let artifact = ContractArtifact::from_json(ARTIFACT_JSON).unwrap();
        let json = artifact.to_json().unwrap();
        assert!(json.contains("\"bytecode\": \"0x6080604052\""));
        assert_eq!(ContractArtifact::from_json(&json).unwrap(), artifact);
    }

    #[test]
    fn test_bad_bytecode_rejected() {
        let json = ARTIFACT_JSON.replace("0x6080604052", "0xnothex");
        assert!(ContractArtifact::from_json(&json).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ContractArtifact::load("/nonexistent/SimpleStorage.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read contract artifact"));
    }
}

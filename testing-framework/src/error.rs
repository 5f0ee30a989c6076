// File: testing-framework/src/error.rs
//
// Harness Errors
//
// Failures a contract test can end with. Deployment, transaction and call
// failures carry a `Failure` describing why the chain or node gave up.

use crate::abi::AbiError;
use crate::config::ConfigError;
use crate::primitives::U256;
use crate::tier1_component::{ChainError, ExecutionFault, TransactionReceipt};
use crate::tier2_integration::waiters::WaitError;
use crate::tier2_integration::RpcError;
use std::time::Duration;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Why a deployment, transaction or call did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("reverted: {0}")]
    Reverted(String),

    #[error("out of gas")]
    OutOfGas,

    #[error("invalid contract bytecode")]
    InvalidBytecode,

    #[error("rejected by node: {0}")]
    Rejected(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("node unavailable: {0}")]
    Unavailable(String),
}

impl From<ExecutionFault> for Failure {
    fn from(fault: ExecutionFault) -> Self {
        match fault {
            ExecutionFault::OutOfGas => Failure::OutOfGas,
            ExecutionFault::Revert(reason) => Failure::Reverted(reason),
            other => Failure::Reverted(other.to_string()),
        }
    }
}

impl From<ChainError> for Failure {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Execution(fault) => fault.into(),
            ChainError::IntrinsicGasTooLow { .. } => Failure::OutOfGas,
            ChainError::EmptyBytecode | ChainError::UnknownBytecode(_) => Failure::InvalidBytecode,
            other => Failure::Rejected(other.to_string()),
        }
    }
}

impl From<RpcError> for Failure {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Unavailable(reason) => Failure::Unavailable(reason),
            RpcError::Rejected(chain) => chain.into(),
        }
    }
}

impl From<WaitError> for Failure {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout { timeout, .. } => Failure::Timeout(timeout),
            WaitError::Rpc(rpc) => rpc.into(),
        }
    }
}

impl Failure {
    /// Failure recorded in a mined receipt, `None` for successful receipts
    pub fn from_receipt(receipt: &TransactionReceipt) -> Option<Self> {
        if receipt.is_success() {
            return None;
        }
        Some(match &receipt.fault {
            Some(fault) => fault.clone().into(),
            None => Failure::Reverted("transaction reverted".to_string()),
        })
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Deployment of {contract} failed: {reason}")]
    Deployment { contract: String, reason: Failure },

    #[error("Transaction {function} failed: {reason}")]
    Transaction { function: String, reason: Failure },

    #[error("Call {function} failed: {reason}")]
    Call { function: String, reason: Failure },

    #[error("Assertion failed: expected {expected}, got {actual}")]
    Assertion { expected: U256, actual: U256 },

    #[error("Contract artifact '{0}' not found")]
    ArtifactNotFound(String),

    #[error("Invalid value '{input}': {reason}")]
    InvalidValue { input: String, reason: String },

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HarnessError {
    pub fn deployment(contract: impl Into<String>, reason: impl Into<Failure>) -> Self {
        HarnessError::Deployment {
            contract: contract.into(),
            reason: reason.into(),
        }
    }

    pub fn transaction(function: impl Into<String>, reason: impl Into<Failure>) -> Self {
        HarnessError::Transaction {
            function: function.into(),
            reason: reason.into(),
        }
    }

    pub fn call(function: impl Into<String>, reason: impl Into<Failure>) -> Self {
        HarnessError::Call {
            function: function.into(),
            reason: reason.into(),
        }
    }

    /// Underlying failure reason for deployment, transaction and call errors
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            HarnessError::Deployment { reason, .. }
            | HarnessError::Transaction { reason, .. }
            | HarnessError::Call { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Unknown contract names count as deployment-phase failures
    pub fn is_deployment(&self) -> bool {
        matches!(
            self,
            HarnessError::Deployment { .. } | HarnessError::ArtifactNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Address, Hash};

    #[test]
    fn test_failure_from_chain_error() {
        assert_eq!(
            Failure::from(ChainError::Execution(ExecutionFault::OutOfGas)),
            Failure::OutOfGas
        );
        assert_eq!(
            Failure::from(ChainError::UnknownBytecode(Hash::zero())),
            Failure::InvalidBytecode
        );
        assert_eq!(
            Failure::from(ChainError::IntrinsicGasTooLow {
                required: 53_000,
                limit: 21_000
            }),
            Failure::OutOfGas
        );
        assert!(matches!(
            Failure::from(ChainError::InvalidNonce {
                sender: Address::zero(),
                expected: 1,
                actual: 0
            }),
            Failure::Rejected(msg) if msg.contains("Invalid nonce")
        ));
    }

    #[test]
    fn test_failure_from_rpc_and_wait() {
        assert_eq!(
            Failure::from(RpcError::Unavailable("down".to_string())),
            Failure::Unavailable("down".to_string())
        );
        let timeout = Duration::from_secs(3);
        assert_eq!(
            Failure::from(WaitError::Timeout {
                what: "receipt".to_string(),
                timeout
            }),
            Failure::Timeout(timeout)
        );
        assert_eq!(
            Failure::from(WaitError::Rpc(RpcError::Rejected(ChainError::Execution(
                ExecutionFault::Revert("nope".to_string())
            )))),
            Failure::Reverted("nope".to_string())
        );
    }

    #[test]
    fn test_error_messages() {
        let err = HarnessError::deployment("SimpleStorage", Failure::OutOfGas);
        assert_eq!(
            err.to_string(),
            "Deployment of SimpleStorage failed: out of gas"
        );
        assert!(err.is_deployment());
        assert_eq!(err.failure(), Some(&Failure::OutOfGas));

        let err = HarnessError::Assertion {
            expected: U256::from(10u64),
            actual: U256::zero(),
        };
        assert_eq!(err.to_string(), "Assertion failed: expected 10, got 0");
        assert!(err.failure().is_none());
        assert!(HarnessError::ArtifactNotFound("Missing".to_string()).is_deployment());
    }
}

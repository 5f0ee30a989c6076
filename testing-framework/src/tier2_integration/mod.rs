// File: testing-framework/src/tier2_integration/mod.rs
//
// Tier 2 Integration Testing Components
//
// RPC-shaped access to a test chain: the ChainRpc trait, an in-process
// TestNode implementing it, and waiter primitives for confirmations.

pub mod builder;
pub mod rpc_helpers;
pub mod test_node;
/// Waiter primitives for receipts and block heights
pub mod waiters;

#[cfg(test)]
pub mod property_tests;

pub use builder::TestNodeBuilder;
pub use test_node::TestNode;

use crate::primitives::{Address, Hash, U256};
use crate::tier1_component::{ChainError, TestBlock, TransactionReceipt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::tier1_component::CallRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The node cannot be reached (stopped, or the network is down)
    #[error("Node unavailable: {0}")]
    Unavailable(String),

    /// The node refused the request
    #[error("Request rejected: {0}")]
    Rejected(#[from] ChainError),
}

/// Transaction as submitted over RPC; unset fields are filled by the node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` deploys `data` as contract bytecode
    pub to: Option<Address>,
    pub data: Vec<u8>,
    pub gas: Option<u64>,
    pub gas_price: Option<u64>,
    pub nonce: Option<u64>,
}

impl TransactionRequest {
    pub fn deploy(from: Address, bytecode: Vec<u8>) -> Self {
        Self {
            from,
            data: bytecode,
            ..Default::default()
        }
    }

    pub fn call(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// RPC surface of a chain node used by contract handles and waiters.
///
/// # Implementation Note
///
/// A node that cannot answer must return `RpcError::Unavailable` rather than
/// stale data, so callers can tell infrastructure failures from rejections.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Fixture accounts the node can send from
    async fn accounts(&self) -> Result<Vec<Address>, RpcError>;

    /// Height of the latest mined block
    async fn block_number(&self) -> Result<u64, RpcError>;

    async fn get_balance(&self, address: &Address) -> Result<U256, RpcError>;

    /// Confirmed nonce of an account
    async fn get_nonce(&self, address: &Address) -> Result<u64, RpcError>;

    /// Submit a transaction, returning its hash once accepted into the mempool
    async fn send_transaction(&self, request: TransactionRequest) -> Result<Hash, RpcError>;

    /// Receipt of a mined transaction, `None` while pending or unknown
    async fn get_transaction_receipt(
        &self,
        hash: &Hash,
    ) -> Result<Option<TransactionReceipt>, RpcError>;

    /// Read-only execution against the latest state
    async fn call(&self, request: CallRequest) -> Result<Vec<u8>, RpcError>;

    /// Code hash of the contract at `address`, `None` if nothing is deployed
    async fn get_code_hash(&self, address: &Address) -> Result<Option<Hash>, RpcError>;

    /// Mine the pending transactions into a new block
    async fn mine_block(&self) -> Result<TestBlock, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier1_component::GENESIS_TIMESTAMP;
    use parking_lot::Mutex;

    /// Node that only tracks a height and refuses everything else
    struct MockNode {
        height: Mutex<u64>,
    }

    #[async_trait]
    impl ChainRpc for MockNode {
        async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
            Ok(vec![Address::test_account(0)])
        }

        async fn block_number(&self) -> Result<u64, RpcError> {
            Ok(*self.height.lock())
        }

        async fn get_balance(&self, _address: &Address) -> Result<U256, RpcError> {
            Ok(U256::from(1_000_000u64))
        }

        async fn get_nonce(&self, _address: &Address) -> Result<u64, RpcError> {
            Ok(0)
        }

        async fn send_transaction(&self, _request: TransactionRequest) -> Result<Hash, RpcError> {
            Err(RpcError::Unavailable("read-only mock".to_string()))
        }

        async fn get_transaction_receipt(
            &self,
            _hash: &Hash,
        ) -> Result<Option<TransactionReceipt>, RpcError> {
            Ok(None)
        }

        async fn call(&self, request: CallRequest) -> Result<Vec<u8>, RpcError> {
            Err(RpcError::Rejected(ChainError::NoContract(request.to)))
        }

        async fn get_code_hash(&self, _address: &Address) -> Result<Option<Hash>, RpcError> {
            Ok(None)
        }

        async fn mine_block(&self) -> Result<TestBlock, RpcError> {
            let mut height = self.height.lock();
            *height += 1;
            Ok(TestBlock {
                number: *height,
                hash: Hash::zero(),
                parent_hash: Hash::zero(),
                timestamp: GENESIS_TIMESTAMP,
                transactions: Vec::new(),
                gas_used: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_mock_node_rpc() {
        let node = MockNode {
            height: Mutex::new(100),
        };

        assert_eq!(node.block_number().await.unwrap(), 100);
        assert_eq!(node.mine_block().await.unwrap().number, 101);
        assert_eq!(node.accounts().await.unwrap().len(), 1);

        let addr = Address::test_account(3);
        assert_eq!(
            node.get_balance(&addr).await.unwrap(),
            U256::from(1_000_000u64)
        );
        assert!(matches!(
            node.send_transaction(TransactionRequest::deploy(addr, vec![1]))
                .await,
            Err(RpcError::Unavailable(_))
        ));
        assert!(matches!(
            node.call(CallRequest {
                from: None,
                to: addr,
                data: vec![],
                gas: None
            })
            .await,
            Err(RpcError::Rejected(ChainError::NoContract(_)))
        ));
    }

    #[test]
    fn test_request_constructors() {
        let alice = Address::test_account(0);
        let deploy = TransactionRequest::deploy(alice, vec![0x60]).with_gas(90_000);
        assert!(deploy.to.is_none());
        assert_eq!(deploy.gas, Some(90_000));
        assert!(deploy.nonce.is_none());

        let call = TransactionRequest::call(alice, Address::test_account(1), vec![1, 2]);
        assert_eq!(call.to, Some(Address::test_account(1)));
    }
}

//! TestNode - In-process node for Tier 2 integration testing
//!
//! Wraps a TestChain behind the ChainRpc interface: fills request defaults,
//! can be stopped to simulate an unreachable node, and can add a response
//! latency that is slept on the injected clock.

use crate::config::HarnessConfig;
use crate::orchestrator::Clock;
use crate::primitives::{Address, Hash, U256};
use crate::tier1_component::{TestBlock, TestChain, TestTransaction, TransactionReceipt};
use crate::tier2_integration::{CallRequest, ChainRpc, RpcError, TransactionRequest};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Duration;

/// In-process test node
///
/// # Example
///
/// ```rust,ignore
/// let node = TestNodeBuilder::new().with_clock(clock).build().await?;
/// let alice = node.accounts().await?[0];
///
/// let hash = node
///     .send_transaction(TransactionRequest::deploy(alice, bytecode))
///     .await?;
///
/// node.stop();
/// assert!(node.block_number().await.is_err());
/// ```
pub struct TestNode {
    chain: TestChain,
    clock: Arc<dyn Clock>,
    config: HarnessConfig,
    latency: Option<Duration>,
    running: AtomicBool,
}

impl TestNode {
    /// Use `TestNodeBuilder` instead.
    pub(crate) fn new(
        chain: TestChain,
        clock: Arc<dyn Clock>,
        config: HarnessConfig,
        latency: Option<Duration>,
    ) -> Self {
        Self {
            chain,
            clock,
            config,
            latency,
            running: AtomicBool::new(true),
        }
    }

    // ========================================================================
    // Direct State Access (for test assertions)
    // ========================================================================

    /// Underlying chain, for assertions RPC cannot express
    pub fn chain(&self) -> &TestChain {
        &self.chain
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle Management (start/stop/restart)
    // ========================================================================

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop answering requests; every RPC fails with `Unavailable`
    pub fn stop(&self) {
        log::debug!("Stopping test node");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn start(&self) {
        log::debug!("Starting test node");
        self.running.store(true, Ordering::SeqCst);
    }

    /// Stop then start; chain state is kept
    pub fn restart(&self) {
        self.stop();
        self.start();
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Apply simulated latency, then fail if the node is stopped
    async fn respond(&self) -> Result<(), RpcError> {
        if let Some(latency) = self.latency {
            self.clock.sleep(latency).await;
        }
        if !self.is_running() {
            return Err(RpcError::Unavailable("node is not running".to_string()));
        }
        Ok(())
    }

    async fn fill_transaction(&self, request: TransactionRequest) -> TestTransaction {
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self.chain.pending_nonce(&request.from).await,
        };
        let chain_config = self.chain.config();
        TestTransaction {
            from: request.from,
            to: request.to,
            data: request.data,
            gas_limit: request.gas.unwrap_or(chain_config.default_gas),
            gas_price: request.gas_price.unwrap_or(chain_config.gas_price),
            nonce,
        }
    }
}

// ========================================================================
// ChainRpc trait implementation
// ========================================================================

#[async_trait]
impl ChainRpc for TestNode {
    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        self.respond().await?;
        Ok(self.chain.accounts().await)
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        self.respond().await?;
        Ok(self.chain.block_number().await)
    }

    async fn get_balance(&self, address: &Address) -> Result<U256, RpcError> {
        self.respond().await?;
        Ok(self.chain.get_balance(address).await)
    }

    async fn get_nonce(&self, address: &Address) -> Result<u64, RpcError> {
        self.respond().await?;
        Ok(self.chain.get_nonce(address).await)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<Hash, RpcError> {
        self.respond().await?;
        let tx = self.fill_transaction(request).await;
        Ok(self.chain.submit_transaction(tx).await?)
    }

    async fn get_transaction_receipt(
        &self,
        hash: &Hash,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.respond().await?;
        Ok(self.chain.get_receipt(hash).await)
    }

    async fn call(&self, request: CallRequest) -> Result<Vec<u8>, RpcError> {
        self.respond().await?;
        Ok(self.chain.call(request).await?)
    }

    async fn get_code_hash(&self, address: &Address) -> Result<Option<Hash>, RpcError> {
        self.respond().await?;
        Ok(self.chain.get_code_hash(address).await)
    }

    async fn mine_block(&self) -> Result<TestBlock, RpcError> {
        self.respond().await?;
        Ok(self.chain.mine_block().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PausedClock;
    use crate::tier1_component::runtime::simple_storage;
    use crate::tier1_component::ChainError;
    use crate::tier2_integration::TestNodeBuilder;

    #[tokio::test]
    async fn test_node_lifecycle() {
        let node = TestNodeBuilder::new()
            .with_funded_accounts(1)
            .build()
            .await
            .unwrap();

        assert!(node.is_running());

        node.stop();
        assert!(!node.is_running());
        assert!(matches!(
            node.block_number().await,
            Err(RpcError::Unavailable(_))
        ));

        node.restart();
        assert!(node.is_running());
        assert_eq!(node.block_number().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_fills_nonce_and_gas() {
        let node = TestNodeBuilder::new()
            .with_funded_accounts(1)
            .build()
            .await
            .unwrap();
        let alice = node.accounts().await.unwrap()[0];

        for expected_nonce in 0..3u64 {
            let hash = node
                .send_transaction(TransactionRequest::deploy(
                    alice,
                    simple_storage::bytecode().to_vec(),
                ))
                .await
                .unwrap();
            let tx = node.chain().get_transaction(&hash).await.unwrap();
            assert_eq!(tx.nonce, expected_nonce);
            assert_eq!(tx.gas_limit, node.chain().config().default_gas);
        }
        assert_eq!(node.get_nonce(&alice).await.unwrap(), 3);
        assert_eq!(node.block_number().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_typed() {
        let node = TestNodeBuilder::new()
            .with_funded_accounts(1)
            .build()
            .await
            .unwrap();
        let alice = node.accounts().await.unwrap()[0];

        let err = node
            .send_transaction(TransactionRequest::deploy(alice, vec![0xfe]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Rejected(ChainError::UnknownBytecode(_))
        ));
    }

    #[tokio::test]
    async fn test_latency_uses_clock() {
        let clock = Arc::new(PausedClock::new());
        let node = TestNodeBuilder::new()
            .with_clock(clock.clone())
            .with_latency(Duration::from_millis(250))
            .build()
            .await
            .unwrap();

        let start = clock.now();
        node.block_number().await.unwrap();
        assert!(clock.now() - start >= Duration::from_millis(250));
    }
}

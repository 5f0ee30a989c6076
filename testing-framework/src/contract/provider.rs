//! Contract handle provider
//!
//! Resolves contract names through the registry and deploys fresh instances,
//! waiting for each deployment to be mined. Every wait is bounded by the
//! configured timeouts.

use super::artifact::ContractArtifact;
use super::instance::ContractInstance;
use super::registry::ContractRegistry;
use crate::config::TimeoutConfig;
use crate::error::{Failure, HarnessError, HarnessResult};
use crate::orchestrator::Clock;
use crate::primitives::Address;
use crate::tier1_component::TransactionReceipt;
use crate::tier2_integration::waiters::wait_for_receipt;
use crate::tier2_integration::{CallRequest, ChainRpc, TestNode, TransactionRequest};
use std::sync::Arc;
use tokio::time::timeout;

/// Deploys and attaches contract handles on one node
///
/// Cloning is cheap; clones share the node and registry.
///
/// # Example
///
/// ```rust,ignore
/// let provider = ContractProvider::for_node(node.clone(), registry).await;
/// let storage = provider.new_instance("SimpleStorage").await?;
/// storage.send("store", &[Token::Uint(10.into())]).await?;
/// ```
#[derive(Clone)]
pub struct ContractProvider {
    rpc: Arc<dyn ChainRpc>,
    clock: Arc<dyn Clock>,
    registry: Arc<ContractRegistry>,
    timeouts: TimeoutConfig,
    sender: Address,
    gas: Option<u64>,
}

impl ContractProvider {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        clock: Arc<dyn Clock>,
        registry: Arc<ContractRegistry>,
        timeouts: TimeoutConfig,
        sender: Address,
    ) -> Self {
        Self {
            rpc,
            clock,
            registry,
            timeouts,
            sender,
            gas: None,
        }
    }

    /// Provider on a test node, sending from its first fixture account
    pub async fn for_node(node: Arc<TestNode>, registry: Arc<ContractRegistry>) -> Self {
        let sender = node
            .chain()
            .accounts()
            .await
            .first()
            .copied()
            .unwrap_or_else(Address::zero);
        let clock = node.clock();
        let timeouts = node.config().timeouts.clone();
        Self::new(node, clock, registry, timeouts, sender)
    }

    /// Same node and registry, different sender
    pub fn with_sender(&self, sender: Address) -> Self {
        Self {
            sender,
            ..self.clone()
        }
    }

    /// Gas limit for transactions sent through this provider (node default when unset)
    pub fn with_gas(&self, gas: u64) -> Self {
        Self {
            gas: Some(gas),
            ..self.clone()
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn registry(&self) -> &Arc<ContractRegistry> {
        &self.registry
    }

    pub fn rpc(&self) -> &Arc<dyn ChainRpc> {
        &self.rpc
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Deploy a fresh instance of the named contract
    pub async fn new_instance(&self, name: &str) -> HarnessResult<ContractInstance> {
        let artifact = self.registry.require(name)?;
        self.deploy(artifact).await
    }

    /// Deploy an artifact and wait for the deployment to be mined
    pub async fn deploy(&self, artifact: Arc<ContractArtifact>) -> HarnessResult<ContractInstance> {
        let mut request = TransactionRequest::deploy(self.sender, artifact.bytecode.clone());
        request.gas = self.gas;

        let receipt = self
            .submit(request)
            .await
            .map_err(|reason| HarnessError::deployment(&artifact.contract_name, reason))?;

        let address = receipt.contract_address.ok_or_else(|| {
            HarnessError::deployment(
                &artifact.contract_name,
                Failure::Reverted("receipt has no contract address".to_string()),
            )
        })?;

        log::info!(
            "Deployed {} at {} (block {}, gas {})",
            artifact.contract_name,
            address,
            receipt.block_number,
            receipt.gas_used
        );

        Ok(ContractInstance::new(self.clone(), artifact, address))
    }

    /// Attach to an existing deployment of the named contract
    pub async fn at(&self, name: &str, address: Address) -> HarnessResult<ContractInstance> {
        let artifact = self.registry.require(name)?;

        let code_hash = timeout(self.timeouts.call(), self.rpc.get_code_hash(&address))
            .await
            .map_err(|_| HarnessError::deployment(name, Failure::Timeout(self.timeouts.call())))?
            .map_err(|e| HarnessError::deployment(name, e))?;

        match code_hash {
            Some(hash) if hash == artifact.code_hash() => {
                Ok(ContractInstance::new(self.clone(), artifact, address))
            }
            Some(_) => Err(HarnessError::deployment(
                name,
                Failure::Rejected(format!("contract at {} is not {}", address, name)),
            )),
            None => Err(HarnessError::deployment(
                name,
                Failure::Rejected(format!("no contract deployed at {}", address)),
            )),
        }
    }

    /// Send a transaction and wait for a successful receipt
    pub(crate) async fn submit(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, Failure> {
        let confirmation = self.timeouts.confirmation();

        let hash = timeout(confirmation, self.rpc.send_transaction(request))
            .await
            .map_err(|_| Failure::Timeout(confirmation))??;

        let receipt = wait_for_receipt(
            self.rpc.as_ref(),
            &hash,
            confirmation,
            self.timeouts.poll_interval(),
            self.clock.as_ref(),
        )
        .await?;

        match Failure::from_receipt(&receipt) {
            Some(failure) => Err(failure),
            None => Ok(receipt),
        }
    }

    /// Read-only call bounded by the call timeout
    pub(crate) async fn static_call(&self, request: CallRequest) -> Result<Vec<u8>, Failure> {
        let limit = self.timeouts.call();
        Ok(timeout(limit, self.rpc.call(request))
            .await
            .map_err(|_| Failure::Timeout(limit))??)
    }
}

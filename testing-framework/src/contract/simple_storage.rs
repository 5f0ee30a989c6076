//! Typed client for the SimpleStorage contract

use super::instance::ContractInstance;
use super::provider::ContractProvider;
use crate::abi::{single_uint, Token};
use crate::error::HarnessResult;
use crate::primitives::{Address, U256};
use crate::tier1_component::runtime::simple_storage::NAME;
use crate::tier1_component::TransactionReceipt;

/// `store(uint256)` / `retrieve() -> uint256` over a deployed instance
///
/// ```
/// use storage_testing_framework::prelude::*;
///
/// # tokio_test::block_on(async {
/// let node = Arc::new(TestNodeBuilder::new().build().await.unwrap());
/// let provider =
///     ContractProvider::for_node(node, Arc::new(ContractRegistry::with_builtin())).await;
///
/// let storage = SimpleStorage::deploy(&provider).await.unwrap();
/// storage.store(U256::from(10u64)).await.unwrap();
/// assert_eq!(storage.retrieve().await.unwrap(), U256::from(10u64));
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct SimpleStorage {
    instance: ContractInstance,
}

impl SimpleStorage {
    pub const CONTRACT_NAME: &'static str = NAME;

    /// Deploy a fresh instance
    pub async fn deploy(provider: &ContractProvider) -> HarnessResult<Self> {
        let instance = provider.new_instance(Self::CONTRACT_NAME).await?;
        Ok(Self { instance })
    }

    /// Attach to an existing instance
    pub async fn at(provider: &ContractProvider, address: Address) -> HarnessResult<Self> {
        let instance = provider.at(Self::CONTRACT_NAME, address).await?;
        Ok(Self { instance })
    }

    pub fn address(&self) -> Address {
        self.instance.address()
    }

    pub fn instance(&self) -> &ContractInstance {
        &self.instance
    }

    pub fn from(&self, sender: Address) -> Self {
        Self {
            instance: self.instance.from(sender),
        }
    }

    /// Store `value` and wait until the transaction is mined
    pub async fn store(&self, value: U256) -> HarnessResult<TransactionReceipt> {
        self.instance.send("store", &[Token::Uint(value)]).await
    }

    /// Read the stored value
    pub async fn retrieve(&self) -> HarnessResult<U256> {
        let tokens = self.instance.call("retrieve", &[]).await?;
        Ok(single_uint("retrieve", tokens)?)
    }
}

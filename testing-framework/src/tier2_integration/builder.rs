//! TestNodeBuilder - Fluent API for configuring TestNode instances

use super::test_node::TestNode;
use crate::config::HarnessConfig;
use crate::orchestrator::{Clock, SystemClock};
use crate::primitives::{Address, U256};
use crate::tier1_component::{ContractLogic, TestChainBuilder};
use anyhow::Result;
use std::sync::Arc;
use tokio::time::Duration;

/// Builder for TestNode instances with fluent API
///
/// # Example
///
/// ```rust,ignore
/// let node = TestNodeBuilder::new()
///     .with_config(HarnessConfig::load("harness.yaml")?)
///     .with_clock(clock)
///     .with_funded_accounts(3)
///     .build()
///     .await?;
/// ```
pub struct TestNodeBuilder {
    clock: Option<Arc<dyn Clock>>,
    config: HarnessConfig,
    funded_account_count: Option<usize>,
    funded_accounts: Vec<(Address, U256)>,
    latency: Option<Duration>,
    extra_logic: Vec<(Vec<u8>, Arc<dyn ContractLogic>)>,
}

impl TestNodeBuilder {
    /// Builder with `SystemClock` and the default `HarnessConfig`
    pub fn new() -> Self {
        Self {
            clock: None,
            config: HarnessConfig::default(),
            funded_account_count: None,
            funded_accounts: Vec::new(),
            latency: None,
            extra_logic: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use the chain parameters and timeouts of `config`
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Create N deterministic fixture accounts with the default balance
    ///
    /// Overrides `chain.funded_accounts` of the config.
    pub fn with_funded_accounts(mut self, count: usize) -> Self {
        self.funded_account_count = Some(count);
        self
    }

    /// Add a specific funded account
    pub fn with_funded_account(mut self, address: Address, balance: U256) -> Self {
        self.funded_accounts.push((address, balance));
        self
    }

    pub fn with_default_balance(mut self, balance: U256) -> Self {
        self.config.chain.default_balance = balance;
        self
    }

    pub fn with_auto_mine(mut self, auto_mine: bool) -> Self {
        self.config.chain.auto_mine = auto_mine;
        self
    }

    /// Delay every response by `latency` on the node's clock
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_contract_logic(mut self, bytecode: &[u8], logic: Arc<dyn ContractLogic>) -> Self {
        self.extra_logic.push((bytecode.to_vec(), logic));
        self
    }

    /// Build the TestNode instance
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or chain creation fails.
    pub async fn build(self) -> Result<TestNode> {
        self.config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let mut chain_builder = TestChainBuilder::new()
            .with_clock(clock.clone())
            .with_config(self.config.chain.clone());

        if let Some(count) = self.funded_account_count {
            chain_builder = chain_builder.with_funded_account_count(count);
        }
        for (address, balance) in self.funded_accounts {
            chain_builder = chain_builder.with_funded_account(address, balance);
        }
        for (bytecode, logic) in &self.extra_logic {
            chain_builder = chain_builder.with_contract_logic(bytecode, logic.clone());
        }

        let chain = chain_builder.build().await?;

        Ok(TestNode::new(chain, clock, self.config, self.latency))
    }
}

impl Default for TestNodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! TestChainBuilder - Fluent API for configuring TestChain instances

use super::chain::TestChain;
use super::runtime::{ContractLogic, LogicRegistry};
use crate::config::ChainConfig;
use crate::orchestrator::{Clock, SystemClock};
use crate::primitives::{Address, U256};
use anyhow::{ensure, Result};
use std::sync::Arc;

/// Builder for TestChain instances
///
/// # Example
///
/// ```rust,ignore
/// let chain = TestChainBuilder::new()
///     .with_clock(clock)
///     .with_funded_account_count(3)
///     .with_auto_mine(false)
///     .build()
///     .await?;
/// ```
pub struct TestChainBuilder {
    clock: Option<Arc<dyn Clock>>,
    config: ChainConfig,
    funded_account_count: Option<usize>,
    funded_accounts: Vec<(Address, U256)>,
    logic: LogicRegistry,
}

impl TestChainBuilder {
    /// Builder with default chain parameters and the built-in contracts
    pub fn new() -> Self {
        Self {
            clock: None,
            config: ChainConfig::default(),
            funded_account_count: None,
            funded_accounts: Vec::new(),
            logic: LogicRegistry::with_builtin(),
        }
    }

    /// Set clock implementation (`SystemClock` when unset)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace every chain parameter at once
    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of deterministic fixture accounts funded with the default balance
    pub fn with_funded_account_count(mut self, count: usize) -> Self {
        self.funded_account_count = Some(count);
        self
    }

    /// Fund a specific address, appended after the fixture accounts
    pub fn with_funded_account(mut self, address: Address, balance: U256) -> Self {
        self.funded_accounts.push((address, balance));
        self
    }

    pub fn with_default_balance(mut self, balance: U256) -> Self {
        self.config.default_balance = balance;
        self
    }

    pub fn with_auto_mine(mut self, auto_mine: bool) -> Self {
        self.config.auto_mine = auto_mine;
        self
    }

    pub fn with_block_gas_limit(mut self, limit: u64) -> Self {
        self.config.block_gas_limit = limit;
        self
    }

    pub fn with_gas_price(mut self, price: u64) -> Self {
        self.config.gas_price = price;
        self
    }

    /// Register extra native contract logic under its bytecode
    pub fn with_contract_logic(mut self, bytecode: &[u8], logic: Arc<dyn ContractLogic>) -> Self {
        self.logic.register(bytecode, logic);
        self
    }

    /// Build the chain with its genesis block
    ///
    /// # Errors
    ///
    /// Returns an error if the default gas exceeds the block gas limit, or if
    /// an explicitly funded address duplicates another funded account.
    pub async fn build(self) -> Result<TestChain> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        ensure!(
            self.config.default_gas <= self.config.block_gas_limit,
            "default gas {} exceeds block gas limit {}",
            self.config.default_gas,
            self.config.block_gas_limit
        );

        let count = self
            .funded_account_count
            .unwrap_or(self.config.funded_accounts);
        let mut funded: Vec<(Address, U256)> = (0..count as u64)
            .map(|i| (Address::test_account(i), self.config.default_balance))
            .collect();

        for (address, balance) in self.funded_accounts {
            ensure!(
                !funded.iter().any(|(existing, _)| existing == &address),
                "account {} funded twice",
                address
            );
            funded.push((address, balance));
        }

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Building test chain: {} funded accounts, auto-mine {}, {} contract kinds",
                funded.len(),
                self.config.auto_mine,
                self.logic.len()
            );
        }

        Ok(TestChain::new(clock, self.config, self.logic, funded))
    }
}

impl Default for TestChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

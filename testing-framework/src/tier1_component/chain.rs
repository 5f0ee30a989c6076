//! TestChain - in-process contract chain
//!
//! Holds accounts, deployed contracts, the mempool, mined blocks and
//! receipts behind a single `tokio::sync::RwLock`. Transactions are validated
//! on submission and executed in submission order when a block is mined.

use super::runtime::{
    ContractLogic, ContractStorage, ExecutionContext, ExecutionFault, GasMeter, LogicRegistry,
    CODE_DEPOSIT_GAS_PER_BYTE, CREATE_GAS, TX_BASE_GAS,
};
use crate::config::ChainConfig;
use crate::orchestrator::Clock;
use crate::primitives::{keccak256, Address, Hash, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Timestamp of the genesis block (2024-01-01 00:00:00 UTC)
pub const GENESIS_TIMESTAMP: u64 = 1_704_067_200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Unknown account {0}")]
    UnknownAccount(Address),

    #[error("Invalid nonce for {sender}: expected {expected}, got {actual}")]
    InvalidNonce {
        sender: Address,
        expected: u64,
        actual: u64,
    },

    #[error("Insufficient funds for {sender}: need {required}, have {available}")]
    InsufficientFunds {
        sender: Address,
        required: U256,
        available: U256,
    },

    #[error("Intrinsic gas too low: need {required}, limit {limit}")]
    IntrinsicGasTooLow { required: u64, limit: u64 },

    #[error("Gas limit {limit} exceeds block gas limit {block_limit}")]
    GasLimitExceeded { limit: u64, block_limit: u64 },

    #[error("No contract deployed at {0}")]
    NoContract(Address),

    #[error("Empty contract bytecode")]
    EmptyBytecode,

    #[error("Unknown contract bytecode (code hash {0})")]
    UnknownBytecode(Hash),

    #[error(transparent)]
    Execution(#[from] ExecutionFault),
}

/// Externally owned account state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: U256,
    /// Number of confirmed transactions sent by this account
    pub nonce: u64,
}

/// A transaction as it enters the mempool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTransaction {
    pub from: Address,
    /// `None` creates a contract from `data`
    pub to: Option<Address>,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub nonce: u64,
}

impl TestTransaction {
    pub fn hash(&self) -> Hash {
        let mut preimage = Vec::with_capacity(96 + self.data.len());
        preimage.extend_from_slice(self.from.as_bytes());
        match &self.to {
            Some(to) => {
                preimage.push(1);
                preimage.extend_from_slice(to.as_bytes());
            }
            None => preimage.push(0),
        }
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        preimage.extend_from_slice(&self.gas_limit.to_be_bytes());
        preimage.extend_from_slice(&self.gas_price.to_be_bytes());
        preimage.extend_from_slice(&self.data);
        keccak256(&preimage)
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Gas charged before any contract code runs
    pub fn intrinsic_gas(&self) -> u64 {
        if self.is_create() {
            TX_BASE_GAS + CREATE_GAS
        } else {
            TX_BASE_GAS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: Hash,
    pub block_number: u64,
    pub block_hash: Hash,
    pub from: Address,
    pub to: Option<Address>,
    /// Set for successful contract creations
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub status: ReceiptStatus,
    /// Why execution aborted, for reverted receipts
    pub fault: Option<ExecutionFault>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestBlock {
    pub number: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub transactions: Vec<Hash>,
    pub gas_used: u64,
}

/// Read-only call request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Vec<u8>,
    pub gas: Option<u64>,
}

/// Snapshot of one deployed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSnapshot {
    pub address: Address,
    pub name: String,
    pub code_hash: Hash,
    pub deployed_at: u64,
    pub storage: ContractStorage,
}

struct DeployedContract {
    code_hash: Hash,
    logic: Arc<dyn ContractLogic>,
    storage: ContractStorage,
    deployed_at: u64,
}

struct ChainState {
    accounts: IndexMap<Address, AccountState>,
    genesis_balances: IndexMap<Address, U256>,
    contracts: IndexMap<Address, DeployedContract>,
    blocks: Vec<TestBlock>,
    mempool: VecDeque<TestTransaction>,
    transactions: IndexMap<Hash, TestTransaction>,
    receipts: HashMap<Hash, TransactionReceipt>,
    gas_spent: HashMap<Address, U256>,
}

impl ChainState {
    fn pending_count(&self, sender: &Address) -> u64 {
        self.mempool.iter().filter(|tx| &tx.from == sender).count() as u64
    }

    /// Upfront cost of the sender's transactions still in the mempool
    fn pending_cost(&self, sender: &Address) -> U256 {
        self.mempool
            .iter()
            .filter(|tx| &tx.from == sender)
            .fold(U256::zero(), |total, tx| {
                total.saturating_add(U256::from(tx.gas_limit) * U256::from(tx.gas_price))
            })
    }
}

/// In-process chain
///
/// Cloning shares the same underlying state.
///
/// # Example
///
/// ```rust,ignore
/// let chain = TestChainBuilder::new().with_funded_account_count(2).build().await?;
/// let alice = chain.accounts().await[0];
/// let hash = chain.submit_transaction(create_tx).await?;
/// let receipt = chain.get_receipt(&hash).await.unwrap();
/// ```
#[derive(Clone)]
pub struct TestChain {
    state: Arc<RwLock<ChainState>>,
    logic: Arc<LogicRegistry>,
    clock: Arc<dyn Clock>,
    config: ChainConfig,
    genesis_instant: Instant,
}

impl TestChain {
    pub(crate) fn new(
        clock: Arc<dyn Clock>,
        config: ChainConfig,
        logic: LogicRegistry,
        funded: Vec<(Address, U256)>,
    ) -> Self {
        let mut accounts = IndexMap::new();
        let mut genesis_balances = IndexMap::new();
        for (addr, balance) in funded {
            accounts.insert(addr, AccountState { balance, nonce: 0 });
            genesis_balances.insert(addr, balance);
        }

        let genesis = TestBlock {
            number: 0,
            hash: keccak256(b"genesis"),
            parent_hash: Hash::zero(),
            timestamp: GENESIS_TIMESTAMP,
            transactions: Vec::new(),
            gas_used: 0,
        };

        let state = ChainState {
            accounts,
            genesis_balances,
            contracts: IndexMap::new(),
            blocks: vec![genesis],
            mempool: VecDeque::new(),
            transactions: IndexMap::new(),
            receipts: HashMap::new(),
            gas_spent: HashMap::new(),
        };

        let genesis_instant = clock.now();
        Self {
            state: Arc::new(RwLock::new(state)),
            logic: Arc::new(logic),
            clock,
            config,
            genesis_instant,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Validate and enqueue a transaction; mines it right away in auto-mine mode
    pub async fn submit_transaction(&self, tx: TestTransaction) -> Result<Hash, ChainError> {
        let mut state = self.state.write().await;

        let account = state
            .accounts
            .get(&tx.from)
            .ok_or(ChainError::UnknownAccount(tx.from))?;

        let expected_nonce = account.nonce + state.pending_count(&tx.from);
        if tx.nonce != expected_nonce {
            return Err(ChainError::InvalidNonce {
                sender: tx.from,
                expected: expected_nonce,
                actual: tx.nonce,
            });
        }

        if tx.gas_limit > self.config.block_gas_limit {
            return Err(ChainError::GasLimitExceeded {
                limit: tx.gas_limit,
                block_limit: self.config.block_gas_limit,
            });
        }

        if tx.gas_limit < tx.intrinsic_gas() {
            return Err(ChainError::IntrinsicGasTooLow {
                required: tx.intrinsic_gas(),
                limit: tx.gas_limit,
            });
        }

        // Queued transactions keep their worst-case cost reserved until mined
        let upfront = U256::from(tx.gas_limit) * U256::from(tx.gas_price);
        let available = account
            .balance
            .saturating_sub(state.pending_cost(&tx.from));
        if available < upfront {
            return Err(ChainError::InsufficientFunds {
                sender: tx.from,
                required: upfront,
                available,
            });
        }

        match &tx.to {
            None => {
                if tx.data.is_empty() {
                    return Err(ChainError::EmptyBytecode);
                }
                let code_hash = keccak256(&tx.data);
                if self.logic.resolve(&code_hash).is_none() {
                    return Err(ChainError::UnknownBytecode(code_hash));
                }
            }
            Some(to) => {
                if !state.contracts.contains_key(to) {
                    return Err(ChainError::NoContract(*to));
                }
            }
        }

        let hash = tx.hash();
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Accepted transaction {} from {} (nonce {}, gas limit {}, {} bytes)",
                hash,
                tx.from,
                tx.nonce,
                tx.gas_limit,
                tx.data.len()
            );
        }

        state.transactions.insert(hash, tx.clone());
        state.mempool.push_back(tx);

        if self.config.auto_mine {
            self.mine_locked(&mut state);
        }

        Ok(hash)
    }

    /// Mine every pending transaction into a new block
    pub async fn mine_block(&self) -> Result<TestBlock, ChainError> {
        let mut state = self.state.write().await;
        Ok(self.mine_locked(&mut state))
    }

    fn mine_locked(&self, state: &mut ChainState) -> TestBlock {
        let parent = state
            .blocks
            .last()
            .map(|b| (b.number, b.hash))
            .unwrap_or((0, Hash::zero()));
        let number = parent.0 + 1;
        let timestamp = self.current_timestamp();

        let pending: Vec<TestTransaction> = state.mempool.drain(..).collect();
        let tx_hashes: Vec<Hash> = pending.iter().map(|tx| tx.hash()).collect();

        let mut preimage = Vec::with_capacity(48 + tx_hashes.len() * 32);
        preimage.extend_from_slice(&number.to_be_bytes());
        preimage.extend_from_slice(parent.1.as_bytes());
        preimage.extend_from_slice(&timestamp.to_be_bytes());
        for hash in &tx_hashes {
            preimage.extend_from_slice(hash.as_bytes());
        }
        let block_hash = keccak256(&preimage);

        let mut block_gas = 0u64;
        for (tx, tx_hash) in pending.into_iter().zip(tx_hashes.iter()) {
            let receipt = self.apply_transaction(state, tx, *tx_hash, number, block_hash);
            block_gas += receipt.gas_used;
            state.receipts.insert(*tx_hash, receipt);
        }

        let block = TestBlock {
            number,
            hash: block_hash,
            parent_hash: parent.1,
            timestamp,
            transactions: tx_hashes,
            gas_used: block_gas,
        };

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Mined block {} ({}) with {} transactions, {} gas",
                block.number,
                block.hash,
                block.transactions.len(),
                block.gas_used
            );
        }

        state.blocks.push(block.clone());
        block
    }

    fn apply_transaction(
        &self,
        state: &mut ChainState,
        tx: TestTransaction,
        tx_hash: Hash,
        block_number: u64,
        block_hash: Hash,
    ) -> TransactionReceipt {
        let mut gas = GasMeter::new(tx.gas_limit);
        let mut contract_address = None;

        // Validated on submission, so the intrinsic charge always fits
        let outcome = gas.charge(tx.intrinsic_gas()).and_then(|_| match &tx.to {
            None => {
                gas.charge(tx.data.len() as u64 * CODE_DEPOSIT_GAS_PER_BYTE)?;
                let code_hash = keccak256(&tx.data);
                let address = Address::contract_address(&tx.from, tx.nonce);
                contract_address = Some(address);
                Ok((address, code_hash))
            }
            Some(to) => Ok((*to, Hash::zero())),
        });

        let fault = match outcome {
            Err(fault) => Some(fault),
            Ok((address, code_hash)) if tx.is_create() => {
                match self.logic.resolve(&code_hash) {
                    Some(logic) => {
                        state.contracts.insert(
                            address,
                            DeployedContract {
                                code_hash,
                                logic,
                                storage: ContractStorage::new(),
                                deployed_at: block_number,
                            },
                        );
                        None
                    }
                    None => Some(ExecutionFault::Revert("unknown bytecode".to_string())),
                }
            }
            Ok((address, _)) => match state.contracts.get_mut(&address) {
                Some(contract) => {
                    let mut scratch = contract.storage.clone();
                    let result = {
                        let mut ctx =
                            ExecutionContext::new(tx.from, address, &mut scratch, &mut gas, false);
                        contract.logic.execute(&mut ctx, &tx.data)
                    };
                    match result {
                        Ok(_) => {
                            contract.storage = scratch;
                            None
                        }
                        Err(fault) => Some(fault),
                    }
                }
                None => Some(ExecutionFault::Revert(format!(
                    "no contract at {}",
                    address
                ))),
            },
        };

        if fault.is_some() {
            contract_address = None;
        }

        let gas_used = gas.used();
        let cost = U256::from(gas_used) * U256::from(tx.gas_price);
        if let Some(account) = state.accounts.get_mut(&tx.from) {
            account.nonce += 1;
            account.balance = account.balance.saturating_sub(cost);
        }
        let spent = state.gas_spent.entry(tx.from).or_insert_with(U256::zero);
        *spent = spent.saturating_add(cost);

        if let Some(fault) = &fault {
            log::debug!("Transaction {} reverted: {}", tx_hash, fault);
        }

        TransactionReceipt {
            transaction_hash: tx_hash,
            block_number,
            block_hash,
            from: tx.from,
            to: tx.to,
            contract_address,
            gas_used,
            status: if fault.is_none() {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Reverted
            },
            fault,
        }
    }

    /// Execute a read-only call against current state
    pub async fn call(&self, request: CallRequest) -> Result<Vec<u8>, ChainError> {
        let state = self.state.read().await;
        let contract = state
            .contracts
            .get(&request.to)
            .ok_or(ChainError::NoContract(request.to))?;

        let mut scratch = contract.storage.clone();
        let mut gas = GasMeter::new(request.gas.unwrap_or(self.config.block_gas_limit));
        let mut ctx = ExecutionContext::new(
            request.from.unwrap_or_else(Address::zero),
            request.to,
            &mut scratch,
            &mut gas,
            true,
        );
        let output = contract.logic.execute(&mut ctx, &request.data)?;
        Ok(output)
    }

    fn current_timestamp(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.genesis_instant);
        GENESIS_TIMESTAMP + elapsed.as_secs()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn block_number(&self) -> u64 {
        let state = self.state.read().await;
        state.blocks.last().map(|b| b.number).unwrap_or(0)
    }

    pub async fn get_block(&self, number: u64) -> Option<TestBlock> {
        let state = self.state.read().await;
        state.blocks.get(number as usize).cloned()
    }

    pub async fn latest_block(&self) -> TestBlock {
        let state = self.state.read().await;
        // genesis is inserted at construction, so there is always a block
        state.blocks[state.blocks.len() - 1].clone()
    }

    /// Balance of an address; unknown addresses hold nothing
    pub async fn get_balance(&self, address: &Address) -> U256 {
        let state = self.state.read().await;
        state
            .accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    /// Confirmed nonce of an address
    pub async fn get_nonce(&self, address: &Address) -> u64 {
        let state = self.state.read().await;
        state.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    /// Nonce the next submitted transaction from `address` must carry
    pub async fn pending_nonce(&self, address: &Address) -> u64 {
        let state = self.state.read().await;
        let confirmed = state.accounts.get(address).map(|a| a.nonce).unwrap_or(0);
        confirmed + state.pending_count(address)
    }

    pub async fn pending_transactions(&self) -> usize {
        self.state.read().await.mempool.len()
    }

    pub async fn get_receipt(&self, hash: &Hash) -> Option<TransactionReceipt> {
        self.state.read().await.receipts.get(hash).cloned()
    }

    pub async fn get_transaction(&self, hash: &Hash) -> Option<TestTransaction> {
        self.state.read().await.transactions.get(hash).cloned()
    }

    /// Every submitted transaction in submission order, with its receipt once mined
    pub async fn transactions(&self) -> Vec<(TestTransaction, Option<TransactionReceipt>)> {
        let state = self.state.read().await;
        state
            .transactions
            .iter()
            .map(|(hash, tx)| (tx.clone(), state.receipts.get(hash).cloned()))
            .collect()
    }

    pub async fn get_code_hash(&self, address: &Address) -> Option<Hash> {
        let state = self.state.read().await;
        state.contracts.get(address).map(|c| c.code_hash)
    }

    pub async fn get_storage_at(&self, address: &Address, slot: U256) -> Result<U256, ChainError> {
        let state = self.state.read().await;
        let contract = state
            .contracts
            .get(address)
            .ok_or(ChainError::NoContract(*address))?;
        Ok(contract.storage.get(&slot).copied().unwrap_or_default())
    }

    /// Fixture accounts in genesis order
    pub async fn accounts(&self) -> Vec<Address> {
        self.state.read().await.accounts.keys().copied().collect()
    }

    pub async fn accounts_kv(&self) -> IndexMap<Address, AccountState> {
        self.state.read().await.accounts.clone()
    }

    pub async fn genesis_balance(&self, address: &Address) -> U256 {
        let state = self.state.read().await;
        state
            .genesis_balances
            .get(address)
            .copied()
            .unwrap_or_default()
    }

    /// Total fees paid by an address
    pub async fn gas_spent(&self, address: &Address) -> U256 {
        let state = self.state.read().await;
        state.gas_spent.get(address).copied().unwrap_or_default()
    }

    /// Number of mined transactions sent by an address
    pub async fn confirmed_transaction_count(&self, address: &Address) -> u64 {
        let state = self.state.read().await;
        state
            .transactions
            .iter()
            .filter(|(hash, tx)| &tx.from == address && state.receipts.contains_key(*hash))
            .count() as u64
    }

    pub async fn contracts(&self) -> Vec<ContractSnapshot> {
        let state = self.state.read().await;
        state
            .contracts
            .iter()
            .map(|(address, c)| ContractSnapshot {
                address: *address,
                name: c.logic.name().to_string(),
                code_hash: c.code_hash,
                deployed_at: c.deployed_at,
                storage: c.storage.clone(),
            })
            .collect()
    }
}

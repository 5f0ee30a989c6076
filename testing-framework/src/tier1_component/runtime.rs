//! Native contract runtime
//!
//! The test chain does not interpret bytecode. A deployed contract's bytecode
//! selects a native [`ContractLogic`] implementation registered under the
//! bytecode's Keccak-256 hash; that implementation runs against an
//! [`ExecutionContext`] that meters gas and guards storage writes.

use crate::abi::{split_selector, ContractAbi, Function, ParamType, StateMutability, Token};
use crate::primitives::{keccak256, Address, Hash, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Base cost of every transaction
pub const TX_BASE_GAS: u64 = 21_000;
/// Extra cost of a contract creation transaction
pub const CREATE_GAS: u64 = 32_000;
/// Cost per byte of deposited bytecode
pub const CODE_DEPOSIT_GAS_PER_BYTE: u64 = 200;
/// Cost of a storage read
pub const SLOAD_GAS: u64 = 2_100;
/// Cost of writing a non-zero value into an empty slot
pub const SSTORE_SET_GAS: u64 = 20_000;
/// Cost of any other storage write
pub const SSTORE_RESET_GAS: u64 = 2_900;

/// Contract storage: slot → word
pub type ContractStorage = BTreeMap<U256, U256>;

/// Ways a contract execution can abort
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ExecutionFault {
    #[error("execution reverted: {0}")]
    Revert(String),

    #[error("out of gas")]
    OutOfGas,

    #[error("state modification attempted in a read-only call")]
    StaticCallViolation,
}

/// Gas accounting for one execution
#[derive(Debug, Clone)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), ExecutionFault> {
        let next = self.used.saturating_add(amount);
        if next > self.limit {
            self.used = self.limit;
            return Err(ExecutionFault::OutOfGas);
        }
        self.used = next;
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

/// Everything a contract can observe or touch while it runs
pub struct ExecutionContext<'a> {
    pub caller: Address,
    pub contract: Address,
    storage: &'a mut ContractStorage,
    gas: &'a mut GasMeter,
    is_static: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        caller: Address,
        contract: Address,
        storage: &'a mut ContractStorage,
        gas: &'a mut GasMeter,
        is_static: bool,
    ) -> Self {
        Self {
            caller,
            contract,
            storage,
            gas,
            is_static,
        }
    }

    /// Read a slot; unset slots read as zero
    pub fn sload(&mut self, slot: U256) -> Result<U256, ExecutionFault> {
        self.gas.charge(SLOAD_GAS)?;
        Ok(self.storage.get(&slot).copied().unwrap_or_default())
    }

    /// Write a slot; writing zero clears it
    pub fn sstore(&mut self, slot: U256, value: U256) -> Result<(), ExecutionFault> {
        if self.is_static {
            return Err(ExecutionFault::StaticCallViolation);
        }
        let current = self.storage.get(&slot).copied().unwrap_or_default();
        let cost = if current.is_zero() && !value.is_zero() {
            SSTORE_SET_GAS
        } else {
            SSTORE_RESET_GAS
        };
        self.gas.charge(cost)?;

        if value.is_zero() {
            self.storage.remove(&slot);
        } else {
            self.storage.insert(slot, value);
        }
        Ok(())
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }
}

/// Native implementation of a contract's behavior
pub trait ContractLogic: Send + Sync {
    /// Human-readable contract name (for logs)
    fn name(&self) -> &str;

    /// Run one call; `input` is the full call data including selector
    fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        input: &[u8],
    ) -> Result<Vec<u8>, ExecutionFault>;
}

/// Code hash → logic lookup used by the chain at deployment time
#[derive(Clone, Default)]
pub struct LogicRegistry {
    entries: HashMap<Hash, Arc<dyn ContractLogic>>,
}

impl LogicRegistry {
    /// Registry with the built-in contracts installed
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        registry.register(
            simple_storage::bytecode(),
            Arc::new(simple_storage::SimpleStorageLogic),
        );
        registry
    }

    pub fn register(&mut self, bytecode: &[u8], logic: Arc<dyn ContractLogic>) {
        self.entries.insert(keccak256(bytecode), logic);
    }

    pub fn resolve(&self, code_hash: &Hash) -> Option<Arc<dyn ContractLogic>> {
        self.entries.get(code_hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The SimpleStorage contract: one uint256 in slot 0
pub mod simple_storage {
    use super::*;

    /// Canonical contract name
    pub const NAME: &str = "SimpleStorage";

    /// Bytecode the native implementation is registered under
    ///
    /// Creation code of the Solidity `SimpleStorage` contract (`uint256 number;
    /// store(uint256)`, `retrieve()`), used only as an identity by the chain.
    pub const BYTECODE_HEX: &str = "608060405234801561001057600080fd5b50610150806100206000396000f3fe608060405234801561001057600080fd5b50600436106100365760003560e01c80632e64cec11461003b5780636057361d14610059575b600080fd5b610043610075565b60405161005091906100d9565b60405180910390f35b610073600480360381019061006e919061009d565b61007e565b005b60008054905090565b8060008190555050565b60008135905061009781610103565b92915050565b6000602082840312156100b3576100b26100fe565b5b60006100c184828501610088565b91505092915050565b6100d3816100f4565b82525050565b60006020820190506100ee60008301846100ca565b92915050565b6000819050919050565b600080fd5b61010c816100f4565b811461011757600080fd5b5056fea2646970667358221220";

    /// Storage slot holding the value
    pub const VALUE_SLOT: u64 = 0;

    pub fn bytecode() -> &'static [u8] {
        static BYTECODE: std::sync::OnceLock<Vec<u8>> = std::sync::OnceLock::new();
        BYTECODE.get_or_init(|| hex::decode(BYTECODE_HEX).unwrap_or_default())
    }

    pub fn store_function() -> Function {
        Function::new(
            "store",
            vec![ParamType::Uint256],
            vec![],
            StateMutability::Nonpayable,
        )
    }

    pub fn retrieve_function() -> Function {
        Function::new(
            "retrieve",
            vec![],
            vec![ParamType::Uint256],
            StateMutability::View,
        )
    }

    pub fn abi() -> ContractAbi {
        ContractAbi::new(vec![retrieve_function(), store_function()])
    }

    pub struct SimpleStorageLogic;

    impl ContractLogic for SimpleStorageLogic {
        fn name(&self) -> &str {
            NAME
        }

        fn execute(
            &self,
            ctx: &mut ExecutionContext<'_>,
            input: &[u8],
        ) -> Result<Vec<u8>, ExecutionFault> {
            let (selector, args) =
                split_selector(input).map_err(|e| ExecutionFault::Revert(e.to_string()))?;

            let store = store_function();
            let retrieve = retrieve_function();

            if selector == store.selector() {
                let tokens = store
                    .decode_input(args)
                    .map_err(|e| ExecutionFault::Revert(e.to_string()))?;
                let value = match tokens.into_iter().next() {
                    Some(Token::Uint(value)) => value,
                    _ => return Err(ExecutionFault::Revert("missing value".to_string())),
                };
                ctx.sstore(U256::from(VALUE_SLOT), value)?;
                Ok(Vec::new())
            } else if selector == retrieve.selector() {
                let value = ctx.sload(U256::from(VALUE_SLOT))?;
                Ok(crate::abi::encode_tokens(&[Token::Uint(value)]))
            } else {
                Err(ExecutionFault::Revert(format!(
                    "function selector 0x{} not recognized",
                    hex::encode(selector)
                )))
            }
        }
    }
}

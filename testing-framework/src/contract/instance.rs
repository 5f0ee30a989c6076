//! Handle to one deployed contract

use super::artifact::ContractArtifact;
use super::provider::ContractProvider;
use crate::abi::{AbiError, ContractAbi, Function, Token};
use crate::error::{HarnessError, HarnessResult};
use crate::primitives::Address;
use crate::tier1_component::TransactionReceipt;
use crate::tier2_integration::{CallRequest, TransactionRequest};
use std::fmt;
use std::sync::Arc;

/// A deployed contract bound to a sender
///
/// `send` is for mutating functions and waits for the transaction to be mined;
/// `call` is for view and pure functions and never touches chain state.
#[derive(Clone)]
pub struct ContractInstance {
    provider: ContractProvider,
    artifact: Arc<ContractArtifact>,
    address: Address,
}

impl ContractInstance {
    pub(crate) fn new(
        provider: ContractProvider,
        artifact: Arc<ContractArtifact>,
        address: Address,
    ) -> Self {
        Self {
            provider,
            artifact,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.artifact.contract_name
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.artifact.abi
    }

    pub fn sender(&self) -> Address {
        self.provider.sender()
    }

    /// Same contract, transactions sent from `sender`
    pub fn from(&self, sender: Address) -> Self {
        Self {
            provider: self.provider.with_sender(sender),
            ..self.clone()
        }
    }

    /// Invoke a mutating function and wait for its confirmation
    pub async fn send(&self, function: &str, args: &[Token]) -> HarnessResult<TransactionReceipt> {
        let function = self.function(function, false)?;
        let data = function.encode_input(args)?;

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "{}.{} from {} with [{}]",
                self.name(),
                function.signature(),
                self.sender(),
                args.iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        self.provider
            .submit(TransactionRequest::call(self.sender(), self.address, data))
            .await
            .map_err(|reason| HarnessError::transaction(&function.name, reason))
    }

    /// Invoke a read-only function
    pub async fn call(&self, function: &str, args: &[Token]) -> HarnessResult<Vec<Token>> {
        let function = self.function(function, true)?;
        let data = function.encode_input(args)?;

        let output = self
            .provider
            .static_call(CallRequest {
                from: Some(self.sender()),
                to: self.address,
                data,
                gas: None,
            })
            .await
            .map_err(|reason| HarnessError::call(&function.name, reason))?;

        Ok(function.decode_output(&output)?)
    }

    fn function(&self, name: &str, read_only: bool) -> Result<&Function, AbiError> {
        let function = self.abi().function(name)?;
        if function.state_mutability.is_read_only() != read_only {
            return Err(AbiError::WrongMutability {
                function: function.name.clone(),
                mutability: function.state_mutability,
                usage: if read_only { "call" } else { "transaction" },
            });
        }
        Ok(function)
    }
}

impl fmt::Debug for ContractInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractInstance")
            .field("name", &self.name())
            .field("address", &self.address)
            .field("sender", &self.sender())
            .finish()
    }
}

// File: testing-framework/src/roundtrip.rs
//
// Round-Trip Verifier
//
// deploy → store(v) → retrieve() → compare, as one linear run. The first
// failure ends the run; the report keeps the last stage that completed.

use crate::abi::{single_uint, Token};
use crate::contract::{ContractInstance, ContractProvider};
use crate::error::{HarnessError, HarnessResult};
use crate::primitives::{parse_u256, Address, U256};
use crate::tier1_component::TransactionReceipt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Stages of a round trip, in order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundTripStage {
    Start,
    Deployed,
    Stored,
    Retrieved,
    Verified,
}

impl RoundTripStage {
    /// Stage that follows this one; `None` once verified
    pub fn next(self) -> Option<Self> {
        match self {
            RoundTripStage::Start => Some(RoundTripStage::Deployed),
            RoundTripStage::Deployed => Some(RoundTripStage::Stored),
            RoundTripStage::Stored => Some(RoundTripStage::Retrieved),
            RoundTripStage::Retrieved => Some(RoundTripStage::Verified),
            RoundTripStage::Verified => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == RoundTripStage::Verified
    }
}

/// Outcome of one round trip
#[derive(Debug)]
pub struct RoundTripReport {
    pub contract: String,
    pub value: U256,
    /// Last stage reached
    pub stage: RoundTripStage,
    pub address: Option<Address>,
    pub store_receipt: Option<TransactionReceipt>,
    pub retrieved: Option<U256>,
    pub duration: Duration,
    /// Why the run stopped before `Verified`
    pub error: Option<HarnessError>,
}

impl RoundTripReport {
    fn new(contract: &str, value: U256) -> Self {
        Self {
            contract: contract.to_string(),
            value,
            stage: RoundTripStage::Start,
            address: None,
            store_receipt: None,
            retrieved: None,
            duration: Duration::ZERO,
            error: None,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            log::debug!("Round trip of {}: {} → {}", self.contract, self.stage, next);
            self.stage = next;
        }
    }

    pub fn is_verified(&self) -> bool {
        self.stage.is_terminal() && self.error.is_none()
    }

    /// The retrieved value on success, the failure otherwise
    pub fn into_result(self) -> HarnessResult<U256> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.retrieved.unwrap_or_default()),
        }
    }
}

/// Drives store/retrieve round trips against contracts from one provider
///
/// The contract must expose `store(uint256)` and `retrieve() -> uint256`.
///
/// # Example
///
/// ```rust,ignore
/// let verifier = RoundTripVerifier::new(provider);
/// let report = verifier.run("SimpleStorage", U256::from(10)).await;
/// assert_eq!(report.stage, RoundTripStage::Verified);
/// ```
#[derive(Clone)]
pub struct RoundTripVerifier {
    provider: ContractProvider,
}

impl RoundTripVerifier {
    pub fn new(provider: ContractProvider) -> Self {
        Self { provider }
    }

    /// Send `store(value)` and wait for its confirmation
    pub async fn store(
        &self,
        handle: &ContractInstance,
        value: U256,
    ) -> HarnessResult<TransactionReceipt> {
        handle.send("store", &[Token::Uint(value)]).await
    }

    /// Read the stored value without touching chain state
    pub async fn retrieve(&self, handle: &ContractInstance) -> HarnessResult<U256> {
        let tokens = handle.call("retrieve", &[]).await?;
        Ok(single_uint("retrieve", tokens)?)
    }

    /// Fail with an assertion error unless the values are equal
    pub fn verify(stored: U256, retrieved: U256) -> HarnessResult<()> {
        if stored != retrieved {
            return Err(HarnessError::Assertion {
                expected: stored,
                actual: retrieved,
            });
        }
        Ok(())
    }

    /// Compare against a textual expectation such as `"10"` or `"0x0a"`
    pub fn verify_text(expected: &str, retrieved: U256) -> HarnessResult<()> {
        Self::verify(parse_value(expected)?, retrieved)
    }

    /// Deploy a fresh instance of `contract` and run the full round trip
    pub async fn run(&self, contract: &str, value: U256) -> RoundTripReport {
        let started = Instant::now();
        let mut report = RoundTripReport::new(contract, value);
        if let Err(error) = self.drive(&mut report).await {
            log::warn!(
                "Round trip of {} stopped after {}: {}",
                contract,
                report.stage,
                error
            );
            report.error = Some(error);
        }
        report.duration = started.elapsed();
        report
    }

    async fn drive(&self, report: &mut RoundTripReport) -> HarnessResult<()> {
        let handle = self.provider.new_instance(&report.contract).await?;
        report.address = Some(handle.address());
        report.advance();

        report.store_receipt = Some(self.store(&handle, report.value).await?);
        report.advance();

        let retrieved = self.retrieve(&handle).await?;
        report.retrieved = Some(retrieved);
        report.advance();

        Self::verify(report.value, retrieved)?;
        report.advance();

        log::info!(
            "Round trip of {} verified: stored {}, retrieved {}",
            report.contract,
            report.value,
            retrieved
        );
        Ok(())
    }
}

/// Parse a decimal or `0x` hex value
pub fn parse_value(text: &str) -> HarnessResult<U256> {
    parse_u256(text).map_err(|reason| HarnessError::InvalidValue {
        input: text.to_string(),
        reason,
    })
}

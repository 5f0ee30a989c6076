//! YAML scenario model and validation
//!
//! Scenarios are parsed with serde and then validated as a whole: account
//! and instance names must be declared before they are used, so a typo fails
//! at parse time instead of halfway through a run.

use crate::invariants::Invariant;
use crate::primitives::{parse_u256, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// A complete test scenario
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub genesis: Genesis,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub invariants: Vec<Invariant>,
}

/// Initial chain state
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Genesis {
    pub accounts: Vec<GenesisAccount>,
    /// Balance of accounts that do not set their own
    #[serde(default, deserialize_with = "optional_u256")]
    pub balance: Option<U256>,
    #[serde(default = "default_auto_mine")]
    pub auto_mine: bool,
}

fn default_auto_mine() -> bool {
    true
}

/// Named fixture account, written either as `alice` or `{ name: alice, balance: "1000" }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "AccountEntry")]
pub struct GenesisAccount {
    pub name: String,
    pub balance: Option<U256>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccountEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, deserialize_with = "optional_u256")]
        balance: Option<U256>,
    },
}

impl From<AccountEntry> for GenesisAccount {
    fn from(entry: AccountEntry) -> Self {
        match entry {
            AccountEntry::Name(name) => Self {
                name,
                balance: None,
            },
            AccountEntry::Detailed { name, balance } => Self { name, balance },
        }
    }
}

/// Scenario step, tagged by `action`
#[derive(Debug, Clone, PartialEq, Deserialize, strum::Display)]
#[serde(tag = "action", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    /// Deploy a registered contract and name the instance
    Deploy {
        contract: String,
        #[serde(rename = "as")]
        alias: String,
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        gas: Option<u64>,
        #[serde(default)]
        expect: Option<Expect>,
    },
    /// `store(value)` on an instance
    Store {
        instance: String,
        #[serde(deserialize_with = "required_u256")]
        value: U256,
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        gas: Option<u64>,
        #[serde(default)]
        expect: Option<Expect>,
    },
    /// `retrieve()` on an instance, compared with `eq`
    Retrieve {
        instance: String,
        #[serde(deserialize_with = "required_u256")]
        eq: U256,
    },
    /// Any mutating function
    Send {
        instance: String,
        function: String,
        #[serde(default)]
        args: Vec<ArgValue>,
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        gas: Option<u64>,
        #[serde(default)]
        expect: Option<Expect>,
    },
    /// Any read-only function, optionally compared with `eq`
    Call {
        instance: String,
        function: String,
        #[serde(default)]
        args: Vec<ArgValue>,
        #[serde(default)]
        eq: Option<ArgValue>,
    },
    /// Full deploy/store/retrieve/verify run on a fresh instance
    Roundtrip {
        contract: String,
        #[serde(deserialize_with = "required_u256")]
        value: U256,
    },
    MineBlock,
    AdvanceTime {
        seconds: u64,
    },
    AssertBlockNumber {
        eq: u64,
    },
    AssertNonce {
        account: String,
        eq: u64,
    },
}

/// Expected outcome of a transaction step
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Expect {
    pub status: ExpectStatus,
    /// Substring of the failure message
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExpectStatus {
    Success,
    Failure,
}

/// Function argument or expected output as written in YAML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(u64),
    Text(String),
}

impl Display for ArgValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::Bool(value) => write!(f, "{}", value),
            ArgValue::Int(value) => write!(f, "{}", value),
            ArgValue::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberText {
    Int(u64),
    Text(String),
}

fn number_to_u256<E: serde::de::Error>(raw: NumberText) -> Result<U256, E> {
    match raw {
        NumberText::Int(value) => Ok(U256::from(value)),
        NumberText::Text(text) => parse_u256(&text).map_err(E::custom),
    }
}

fn required_u256<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    number_to_u256(NumberText::deserialize(deserializer)?)
}

fn optional_u256<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
    Option::<NumberText>::deserialize(deserializer)?
        .map(number_to_u256)
        .transpose()
}

impl TestScenario {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Scenario name is empty");
        }
        if self.genesis.accounts.is_empty() {
            anyhow::bail!("Genesis must declare at least one account");
        }
        if self.steps.is_empty() {
            anyhow::bail!("Scenario has no steps");
        }

        let mut accounts = HashSet::new();
        for account in &self.genesis.accounts {
            if account.name.is_empty() {
                anyhow::bail!("Genesis account with empty name");
            }
            if !accounts.insert(account.name.as_str()) {
                anyhow::bail!("Duplicate genesis account '{}'", account.name);
            }
        }

        let mut instances: HashSet<&str> = HashSet::new();
        for (idx, step) in self.steps.iter().enumerate() {
            self.validate_step(step, &accounts, &mut instances)
                .with_context(|| format!("Invalid step {} ({})", idx + 1, step))?;
        }
        Ok(())
    }

    fn validate_step<'a>(
        &self,
        step: &'a Step,
        accounts: &HashSet<&str>,
        instances: &mut HashSet<&'a str>,
    ) -> Result<()> {
        match step {
            Step::Deploy {
                contract,
                alias,
                from,
                ..
            } => {
                known_account(accounts, from)?;
                if contract.is_empty() {
                    anyhow::bail!("Missing contract name");
                }
                if accounts.contains(alias.as_str()) {
                    anyhow::bail!("Instance name '{}' shadows an account", alias);
                }
                if !instances.insert(alias.as_str()) {
                    anyhow::bail!("Instance '{}' is deployed twice", alias);
                }
            }
            Step::Store { instance, from, .. } => {
                known_account(accounts, from)?;
                known_instance(instances, instance)?;
            }
            Step::Send {
                instance,
                function,
                from,
                ..
            } => {
                known_account(accounts, from)?;
                known_instance(instances, instance)?;
                if function.is_empty() {
                    anyhow::bail!("Missing function name");
                }
            }
            Step::Retrieve { instance, .. } => known_instance(instances, instance)?,
            Step::Call {
                instance, function, ..
            } => {
                known_instance(instances, instance)?;
                if function.is_empty() {
                    anyhow::bail!("Missing function name");
                }
            }
            Step::Roundtrip { contract, .. } => {
                if !self.genesis.auto_mine {
                    anyhow::bail!("roundtrip needs genesis.auto_mine");
                }
                if contract.is_empty() {
                    anyhow::bail!("Missing contract name");
                }
            }
            Step::AssertNonce { account, .. } => {
                if !accounts.contains(account.as_str()) {
                    anyhow::bail!("Unknown account '{}'", account);
                }
            }
            Step::MineBlock | Step::AdvanceTime { .. } | Step::AssertBlockNumber { .. } => {}
        }
        Ok(())
    }
}

fn known_account(accounts: &HashSet<&str>, name: &Option<String>) -> Result<()> {
    match name {
        Some(name) if !accounts.contains(name.as_str()) => {
            anyhow::bail!("Unknown account '{}'", name)
        }
        _ => Ok(()),
    }
}

fn known_instance(instances: &HashSet<&str>, name: &str) -> Result<()> {
    if !instances.contains(name) {
        anyhow::bail!("Instance '{}' is used before it is deployed", name);
    }
    Ok(())
}

/// Parse and validate a scenario from YAML text
pub fn parse_scenario(yaml: &str) -> Result<TestScenario> {
    let scenario: TestScenario =
        serde_yaml::from_str(yaml).context("Failed to parse scenario YAML")?;
    scenario.validate()?;
    Ok(scenario)
}

/// Read, parse and validate a scenario file
pub async fn load_scenario(path: impl AsRef<Path>) -> Result<TestScenario> {
    let path = path.as_ref();
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    parse_scenario(&yaml).with_context(|| format!("Invalid scenario {}", path.display()))
}

//! YAML scenario execution engine
//!
//! Runs a parsed scenario against a fresh `TestNode` on a paused clock.
//!
//! With `genesis.auto_mine` every transaction step is settled right away.
//! Without it, transaction steps only submit; their expectations are checked
//! by the next `mine_block` step, and an instance deployed that way becomes
//! usable once its block is mined.
//!
//! # Example
//!
//! ```rust,ignore
//! use storage_testing_framework::scenarios::{parse_scenario, ScenarioExecutor};
//!
//! let yaml = r#"
//! name: "Store then read"
//! genesis:
//!   accounts: [alice]
//! steps:
//!   - { action: deploy, contract: SimpleStorage, as: storage }
//!   - { action: store, instance: storage, value: "10" }
//!   - { action: retrieve, instance: storage, eq: "10" }
//! "#;
//!
//! let scenario = parse_scenario(yaml)?;
//! let mut executor = ScenarioExecutor::new();
//! let report = executor.execute(scenario).await?;
//!
//! assert!(report.success);
//! ```

use super::parser::{ArgValue, Expect, ExpectStatus, Step, TestScenario};
use crate::abi::{AbiError, ParamType, Token};
use crate::config::HarnessConfig;
use crate::contract::{ContractInstance, ContractProvider, ContractRegistry};
use crate::error::Failure;
use crate::invariants::check_chain;
use crate::orchestrator::{Clock, PausedClock};
use crate::primitives::{Address, Hash, U256};
use crate::roundtrip::{parse_value, RoundTripVerifier};
use crate::tier1_component::TransactionReceipt;
use crate::tier2_integration::{ChainRpc, TestNode, TestNodeBuilder, TransactionRequest};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// A deployed, named contract instance
#[derive(Debug, Clone)]
struct NamedInstance {
    contract: String,
    address: Address,
}

/// What a submitted transaction was for
#[derive(Debug, Clone)]
enum Submission {
    Deploy { contract: String, alias: String },
    Invoke { label: String },
}

impl Submission {
    fn label(&self) -> String {
        match self {
            Submission::Deploy { contract, alias } => format!("deploy {} as '{}'", contract, alias),
            Submission::Invoke { label } => label.clone(),
        }
    }
}

/// Transaction waiting for the next mined block
#[derive(Debug, Clone)]
struct PendingTransaction {
    step: usize,
    hash: Hash,
    submission: Submission,
    expect: Option<Expect>,
}

/// Scenario executor that runs parsed YAML scenarios
pub struct ScenarioExecutor {
    config: HarnessConfig,
    registry: Arc<ContractRegistry>,

    node: Option<Arc<TestNode>>,

    /// Created once; tokio time can only be paused once per runtime
    clock: Option<Arc<PausedClock>>,

    provider: Option<ContractProvider>,

    /// Named accounts (name → address)
    accounts: IndexMap<String, Address>,

    /// Deployed instances (alias → contract)
    instances: HashMap<String, NamedInstance>,

    pending: Vec<PendingTransaction>,

    /// Execution log
    log: Vec<String>,

    /// Current step number (1-indexed)
    current_step: usize,
}

impl ScenarioExecutor {
    /// Executor with the default config and the builtin contracts
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
            registry: Arc::new(ContractRegistry::with_builtin()),
            node: None,
            clock: None,
            provider: None,
            accounts: IndexMap::new(),
            instances: HashMap::new(),
            pending: Vec::new(),
            log: Vec::new(),
            current_step: 0,
        }
    }

    /// Chain parameters and timeouts for every scenario
    ///
    /// `genesis.auto_mine` of a scenario still wins over `chain.auto_mine`.
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Run scenarios on `clock` instead of pausing the runtime on first use
    ///
    /// Executors sharing one runtime must share one clock, since time can be
    /// paused only once per runtime.
    pub fn with_clock(mut self, clock: Arc<PausedClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_registry(mut self, registry: Arc<ContractRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Node of the last executed scenario
    pub fn node(&self) -> Option<&Arc<TestNode>> {
        self.node.as_ref()
    }

    /// Execute a complete scenario
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Genesis setup fails
    /// - Any step execution fails
    /// - Any assertion, expectation or invariant fails
    pub async fn execute(&mut self, scenario: TestScenario) -> Result<ExecutionReport> {
        self.log.clear();
        self.current_step = 0;
        self.accounts.clear();
        self.instances.clear();
        self.pending.clear();

        self.log(format!("Starting scenario: {}", scenario.name));
        if let Some(desc) = &scenario.description {
            self.log(format!("Description: {}", desc));
        }

        self.setup_genesis(&scenario).await?;

        for (idx, step) in scenario.steps.iter().enumerate() {
            self.current_step = idx + 1;
            self.log(format!("\n--- Step {}: {} ---", self.current_step, step));

            self.execute_step(step)
                .await
                .with_context(|| format!("Failed at step {} ({})", self.current_step, step))?;
        }

        if !self.pending.is_empty() {
            self.log(format!(
                "\n{} transaction(s) still pending at the end of the scenario",
                self.pending.len()
            ));
        }

        if !scenario.invariants.is_empty() {
            self.log("\n--- Checking Invariants ---".to_string());
            let node = self.current_node()?;
            for invariant in &scenario.invariants {
                check_chain(node.chain(), *invariant).await?;
                self.log(format!("  ✓ {} holds", invariant));
            }
        }

        let final_block = self.current_node()?.chain().block_number().await;
        self.log("\n=== Scenario completed successfully ===".to_string());

        Ok(ExecutionReport {
            scenario_name: scenario.name,
            steps_executed: self.current_step,
            final_block,
            success: true,
            log: self.log.clone(),
        })
    }

    /// Build a fresh node with the genesis accounts
    async fn setup_genesis(&mut self, scenario: &TestScenario) -> Result<()> {
        self.log("Setting up genesis...".to_string());

        let clock = match &self.clock {
            Some(clock) => clock.clone(),
            None => {
                let clock = Arc::new(PausedClock::new());
                self.clock = Some(clock.clone());
                clock
            }
        };

        let mut config = self.config.clone();
        config.chain.auto_mine = scenario.genesis.auto_mine;
        let default_balance = scenario
            .genesis
            .balance
            .unwrap_or(config.chain.default_balance);

        let mut builder = TestNodeBuilder::new()
            .with_clock(clock as Arc<dyn Clock>)
            .with_config(config)
            .with_funded_accounts(0);

        for (idx, account) in scenario.genesis.accounts.iter().enumerate() {
            let address = Address::test_account(idx as u64);
            let balance = account.balance.unwrap_or(default_balance);
            self.accounts.insert(account.name.clone(), address);
            builder = builder.with_funded_account(address, balance);

            self.log(format!(
                "  Account '{}': balance={} ({})",
                account.name, balance, address
            ));
        }

        let node = Arc::new(builder.build().await?);
        self.provider =
            Some(ContractProvider::for_node(node.clone(), self.registry.clone()).await);
        self.node = Some(node);

        self.log(format!(
            "Genesis complete: {} accounts, auto_mine={}",
            self.accounts.len(),
            scenario.genesis.auto_mine
        ));
        Ok(())
    }

    async fn execute_step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Deploy {
                contract,
                alias,
                from,
                gas,
                expect,
            } => {
                self.execute_deploy(contract, alias, from.as_deref(), *gas, expect)
                    .await
            }
            Step::Store {
                instance,
                value,
                from,
                gas,
                expect,
            } => {
                let args = [ArgValue::Text(value.to_string())];
                self.execute_send(instance, "store", &args, from.as_deref(), *gas, expect)
                    .await
            }
            Step::Retrieve { instance, eq } => self.execute_retrieve(instance, *eq).await,
            Step::Send {
                instance,
                function,
                args,
                from,
                gas,
                expect,
            } => {
                self.execute_send(instance, function, args, from.as_deref(), *gas, expect)
                    .await
            }
            Step::Call {
                instance,
                function,
                args,
                eq,
            } => self.execute_call(instance, function, args, eq).await,
            Step::Roundtrip { contract, value } => self.execute_roundtrip(contract, *value).await,
            Step::MineBlock => self.execute_mine_block().await,
            Step::AdvanceTime { seconds } => self.execute_advance_time(*seconds).await,
            Step::AssertBlockNumber { eq } => self.execute_assert_block_number(*eq).await,
            Step::AssertNonce { account, eq } => self.execute_assert_nonce(account, *eq).await,
        }
    }

    async fn execute_deploy(
        &mut self,
        contract: &str,
        alias: &str,
        from: Option<&str>,
        gas: Option<u64>,
        expect: &Option<Expect>,
    ) -> Result<()> {
        let sender = self.sender(from)?;
        let artifact = self.registry.require(contract)?;

        self.log(format!(
            "Deploy: {} as '{}' from {}",
            contract, alias, sender
        ));

        let mut request = TransactionRequest::deploy(sender, artifact.bytecode.clone());
        request.gas = gas;

        let submission = Submission::Deploy {
            contract: contract.to_string(),
            alias: alias.to_string(),
        };
        self.submit(request, submission, expect).await
    }

    async fn execute_send(
        &mut self,
        instance: &str,
        function: &str,
        args: &[ArgValue],
        from: Option<&str>,
        gas: Option<u64>,
        expect: &Option<Expect>,
    ) -> Result<()> {
        let sender = self.sender(from)?;
        let target = self.instance(instance)?.clone();
        let artifact = self.registry.require(&target.contract)?;

        let abi_function = artifact.abi.function(function)?;
        if abi_function.state_mutability.is_read_only() {
            return Err(AbiError::WrongMutability {
                function: abi_function.name.clone(),
                mutability: abi_function.state_mutability,
                usage: "transaction",
            }
            .into());
        }
        let tokens = self.tokens(args, &abi_function.inputs)?;
        let data = abi_function.encode_input(&tokens)?;

        let label = format!("{}.{}({})", instance, function, join(&tokens));
        self.log(format!("Send: {} from {}", label, sender));

        let mut request = TransactionRequest::call(sender, target.address, data);
        request.gas = gas;
        self.submit(request, Submission::Invoke { label }, expect)
            .await
    }

    async fn execute_retrieve(&mut self, instance: &str, expected: U256) -> Result<()> {
        let handle = self.handle(instance)?;
        let verifier = RoundTripVerifier::new(self.current_provider()?.clone());

        let actual = verifier.retrieve(&handle).await?;
        self.log(format!("Retrieve: {}.retrieve() = {}", instance, actual));

        RoundTripVerifier::verify(expected, actual)?;
        self.log(format!("  ✓ Value equals {}", expected));
        Ok(())
    }

    async fn execute_call(
        &mut self,
        instance: &str,
        function: &str,
        args: &[ArgValue],
        eq: &Option<ArgValue>,
    ) -> Result<()> {
        let handle = self.handle(instance)?;
        let inputs = handle.abi().function(function)?.inputs.clone();
        let outputs = handle.abi().function(function)?.outputs.clone();
        let tokens = self.tokens(args, &inputs)?;

        let result = handle.call(function, &tokens).await?;
        self.log(format!(
            "Call: {}.{}({}) = [{}]",
            instance,
            function,
            join(&tokens),
            join(&result)
        ));

        if let Some(expected) = eq {
            let kind = outputs
                .first()
                .copied()
                .with_context(|| format!("{} returns nothing to compare", function))?;
            let expected = self.token(expected, kind)?;
            match result.first() {
                Some(actual) if *actual == expected => {
                    self.log(format!("  ✓ Result equals {}", expected));
                }
                actual => anyhow::bail!(
                    "Call assertion failed: expected {}, got {}",
                    expected,
                    actual.map(|t| t.to_string()).unwrap_or_default()
                ),
            }
        }
        Ok(())
    }

    async fn execute_roundtrip(&mut self, contract: &str, value: U256) -> Result<()> {
        self.log(format!("Round trip: {} with {}", contract, value));

        let verifier = RoundTripVerifier::new(self.current_provider()?.clone());
        let report = verifier.run(contract, value).await;
        self.log(format!(
            "  Reached {} in {:?}",
            report.stage, report.duration
        ));

        let retrieved = report.into_result()?;
        self.log(format!("  ✓ Stored {}, retrieved {}", value, retrieved));
        Ok(())
    }

    async fn execute_mine_block(&mut self) -> Result<()> {
        self.log("Mining block...".to_string());

        let node = self.current_node()?;
        let block = node.mine_block().await?;
        self.log(format!(
            "  ✓ Block #{} mined: {} transaction(s), gas {}",
            block.number,
            block.transactions.len(),
            block.gas_used
        ));

        for pending in std::mem::take(&mut self.pending) {
            self.settle(pending).await?;
        }
        Ok(())
    }

    async fn execute_advance_time(&mut self, seconds: u64) -> Result<()> {
        self.log(format!("Advancing time by {} seconds...", seconds));

        let clock = self.clock.as_ref().context("Clock not initialized")?;
        clock
            .advance(tokio::time::Duration::from_secs(seconds))
            .await;

        self.log(format!("  ✓ Time advanced by {}s", seconds));
        Ok(())
    }

    async fn execute_assert_block_number(&mut self, expected: u64) -> Result<()> {
        let actual = self.current_node()?.block_number().await?;
        self.log(format!("Assert block number: actual={}", actual));

        if actual != expected {
            anyhow::bail!(
                "Block number assertion failed: expected {}, got {}",
                expected,
                actual
            );
        }
        self.log(format!("  ✓ Block number equals {}", expected));
        Ok(())
    }

    async fn execute_assert_nonce(&mut self, account: &str, expected: u64) -> Result<()> {
        let address = *self.get_account(account)?;
        let actual = self.current_node()?.get_nonce(&address).await?;

        self.log(format!(
            "Assert nonce for '{}': actual={}",
            account, actual
        ));

        if actual != expected {
            anyhow::bail!(
                "Nonce assertion failed: expected {}, got {}",
                expected,
                actual
            );
        }

        self.log(format!("  ✓ Nonce equals {}", expected));
        Ok(())
    }

    /// Submit a transaction; settle it now when the node mines on submission
    async fn submit(
        &mut self,
        request: TransactionRequest,
        submission: Submission,
        expect: &Option<Expect>,
    ) -> Result<()> {
        let node = self.current_node()?;

        let hash = match node.send_transaction(request).await {
            Ok(hash) => hash,
            Err(err) => {
                let label = submission.label();
                self.check_outcome(&label, Err(Failure::from(err)), expect)?;
                return Ok(());
            }
        };

        let pending = PendingTransaction {
            step: self.current_step,
            hash,
            submission,
            expect: expect.clone(),
        };

        if node.config().chain.auto_mine {
            self.settle(pending).await
        } else {
            self.log(format!("  … {} pending ({})", pending.submission.label(), hash));
            self.pending.push(pending);
            Ok(())
        }
    }

    /// Check a mined transaction against its expectation
    async fn settle(&mut self, pending: PendingTransaction) -> Result<()> {
        let node = self.current_node()?;
        let receipt = node
            .get_transaction_receipt(&pending.hash)
            .await?
            .with_context(|| format!("No receipt for {} after mining", pending.hash))?;

        let label = pending.submission.label();
        let outcome = match Failure::from_receipt(&receipt) {
            Some(failure) => Err(failure),
            None => Ok(receipt),
        };
        let receipt = self
            .check_outcome(&label, outcome, &pending.expect)
            .with_context(|| format!("Transaction from step {}", pending.step))?;

        if let (Some(receipt), Submission::Deploy { contract, alias }) =
            (receipt, pending.submission)
        {
            let address = receipt
                .contract_address
                .with_context(|| format!("Deployment of '{}' has no address", alias))?;
            self.log(format!("  '{}' = {} at {}", alias, contract, address));
            self.instances
                .insert(alias, NamedInstance { contract, address });
        }
        Ok(())
    }

    /// Compare an outcome with the expected status; success is the default
    fn check_outcome(
        &mut self,
        label: &str,
        outcome: Result<TransactionReceipt, Failure>,
        expect: &Option<Expect>,
    ) -> Result<Option<TransactionReceipt>> {
        let status = expect
            .as_ref()
            .map(|e| e.status)
            .unwrap_or(ExpectStatus::Success);

        match (status, outcome) {
            (ExpectStatus::Success, Ok(receipt)) => {
                self.log(format!(
                    "  ✓ {} succeeded (block {}, gas {})",
                    label, receipt.block_number, receipt.gas_used
                ));
                Ok(Some(receipt))
            }
            (ExpectStatus::Success, Err(failure)) => {
                anyhow::bail!("Expected {} to succeed, but it failed: {}", label, failure)
            }
            (ExpectStatus::Failure, Ok(_)) => {
                anyhow::bail!("Expected {} to fail, but it succeeded", label)
            }
            (ExpectStatus::Failure, Err(failure)) => {
                let message = failure.to_string();
                if let Some(needle) = expect.as_ref().and_then(|e| e.error.as_deref()) {
                    if !message.contains(needle) {
                        anyhow::bail!(
                            "Expected {} to fail with '{}', but it failed with '{}'",
                            label,
                            needle,
                            message
                        );
                    }
                }
                self.log(format!("  ✓ {} failed as expected: {}", label, message));
                Ok(None)
            }
        }
    }

    fn tokens(&self, args: &[ArgValue], types: &[ParamType]) -> Result<Vec<Token>> {
        if args.len() != types.len() {
            anyhow::bail!("Expected {} argument(s), got {}", types.len(), args.len());
        }
        args.iter()
            .zip(types)
            .map(|(arg, kind)| self.token(arg, *kind))
            .collect()
    }

    /// Convert a YAML value to an ABI token of the given type
    fn token(&self, value: &ArgValue, kind: ParamType) -> Result<Token> {
        match (kind, value) {
            (ParamType::Uint256, ArgValue::Int(number)) => Ok(Token::Uint(U256::from(*number))),
            (ParamType::Uint256, ArgValue::Text(text)) => Ok(Token::Uint(parse_value(text)?)),
            (ParamType::Bool, ArgValue::Bool(flag)) => Ok(Token::Bool(*flag)),
            (ParamType::Address, ArgValue::Text(text)) => self.address(text).map(Token::Address),
            (kind, value) => anyhow::bail!("Cannot use '{}' as {}", value, kind),
        }
    }

    /// Account name, instance name or hex address
    fn address(&self, text: &str) -> Result<Address> {
        if let Some(address) = self.accounts.get(text) {
            return Ok(*address);
        }
        if let Some(instance) = self.instances.get(text) {
            return Ok(instance.address);
        }
        text.parse::<Address>()
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", text, e))
    }

    fn sender(&self, from: Option<&str>) -> Result<Address> {
        match from {
            Some(name) => self.get_account(name).copied(),
            None => self
                .accounts
                .values()
                .next()
                .copied()
                .context("Scenario has no accounts"),
        }
    }

    fn instance(&self, alias: &str) -> Result<&NamedInstance> {
        self.instances.get(alias).with_context(|| {
            let mining = self.pending.iter().any(|p| {
                matches!(&p.submission, Submission::Deploy { alias: a, .. } if a == alias)
            });
            if mining {
                format!("Instance '{}' is not mined yet", alias)
            } else {
                format!("Instance '{}' is not deployed", alias)
            }
        })
    }

    /// Handle for read-only calls on a named instance
    fn handle(&self, alias: &str) -> Result<ContractInstance> {
        let target = self.instance(alias)?;
        let artifact = self.registry.require(&target.contract)?;
        Ok(ContractInstance::new(
            self.current_provider()?.clone(),
            artifact,
            target.address,
        ))
    }

    fn get_account(&self, name: &str) -> Result<&Address> {
        self.accounts
            .get(name)
            .with_context(|| format!("Account '{}' not found", name))
    }

    fn current_node(&self) -> Result<Arc<TestNode>> {
        self.node.clone().context("Node not initialized")
    }

    fn current_provider(&self) -> Result<&ContractProvider> {
        self.provider.as_ref().context("Provider not initialized")
    }

    fn log(&mut self, message: String) {
        log::debug!("{}", message.trim_start_matches('\n'));
        self.log.push(message);
    }

    /// Get execution log
    pub fn get_log(&self) -> &[String] {
        &self.log
    }
}

impl Default for ScenarioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn join(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Execution report
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub scenario_name: String,

    /// Number of steps executed
    pub steps_executed: usize,

    /// Block number after the last step
    pub final_block: u64,

    pub success: bool,

    /// Execution log
    pub log: Vec<String>,
}

impl ExecutionReport {
    /// Print report to stdout
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  Scenario Execution Report                                 ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Name: {:<51} ║", self.scenario_name);
        println!("║  Steps: {:<50} ║", self.steps_executed);
        println!("║  Final block: {:<44} ║", self.final_block);
        println!(
            "║  Status: {:<49} ║",
            if self.success {
                "SUCCESS ✓"
            } else {
                "FAILED ✗"
            }
        );
        println!("╚════════════════════════════════════════════════════════════╝\n");

        println!("Execution Log:");
        println!("═════════════");
        for entry in &self.log {
            println!("{}", entry);
        }
    }
}

// File: testing-framework/src/suite.rs
//
// Contract Test Suites
//
// Named suites of named cases, run one after another. Every case gets its
// own node, chain and contract provider, so no state leaks between cases.
// A failed case can leave a failure artifact behind for replay.

use crate::config::HarnessConfig;
use crate::contract::{ContractProvider, ContractRegistry, SimpleStorage};
use crate::invariants;
use crate::orchestrator::TestRng;
use crate::primitives::{Address, U256};
use crate::roundtrip::RoundTripVerifier;
use crate::tier2_integration::{TestNode, TestNodeBuilder};
use crate::utilities::ArtifactCollector;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Body of one test case
pub type CaseFn = Box<dyn Fn(SuiteContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// What a test case runs against
#[derive(Clone)]
pub struct SuiteContext {
    pub node: Arc<TestNode>,
    /// Deploys from the first fixture account
    pub provider: ContractProvider,
    /// Funded fixture accounts in genesis order
    pub accounts: Vec<Address>,
    /// Seed of this case's RNG
    pub seed: u64,
}

impl SuiteContext {
    /// Deterministic RNG for this case
    pub fn rng(&self) -> TestRng {
        TestRng::with_seed(self.seed)
    }
}

struct SuiteCase {
    name: String,
    body: CaseFn,
}

/// Mocha-style suite of contract test cases
///
/// # Example
///
/// ```rust,ignore
/// let report = ContractSuite::new("Simple storage")
///     .it("should store a value", |ctx| {
///         async move {
///             let storage = SimpleStorage::deploy(&ctx.provider).await?;
///             storage.store(U256::from(10)).await?;
///             RoundTripVerifier::verify_text("10", storage.retrieve().await?)?;
///             Ok(())
///         }
///         .boxed()
///     })
///     .run(&HarnessConfig::default())
///     .await;
/// assert!(report.success());
/// ```
pub struct ContractSuite {
    name: String,
    registry: Arc<ContractRegistry>,
    cases: Vec<SuiteCase>,
}

impl ContractSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: Arc::new(ContractRegistry::with_builtin()),
            cases: Vec::new(),
        }
    }

    /// Resolve contracts through `registry` instead of the builtin one
    pub fn with_registry(mut self, registry: Arc<ContractRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Add a case
    pub fn it<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(SuiteContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.cases.push(SuiteCase {
            name: name.into(),
            body: Box::new(body),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run every case in order
    ///
    /// Contract artifacts from `config.artifacts_dir` are loaded into the
    /// registry first; a directory that fails to load fails every case.
    pub async fn run(&self, config: &HarnessConfig) -> SuiteReport {
        let started = Instant::now();
        let mut report = SuiteReport {
            suite: self.name.clone(),
            cases: Vec::with_capacity(self.cases.len()),
            duration: Duration::ZERO,
        };

        let setup = match &config.artifacts_dir {
            Some(dir) => self
                .registry
                .load_dir(dir)
                .map(|count| {
                    log::info!(
                        "Loaded {} contract artifact(s) from {}",
                        count,
                        dir.display()
                    )
                })
                .map_err(|e| format!("{:#}", e)),
            None => Ok(()),
        };

        for case in &self.cases {
            let outcome = match &setup {
                Ok(()) => self.run_case(case, config).await,
                Err(reason) => CaseReport {
                    name: case.name.clone(),
                    passed: false,
                    error: Some(reason.clone()),
                    duration: Duration::ZERO,
                    seed: None,
                    artifact: None,
                },
            };
            report.cases.push(outcome);
        }

        report.duration = started.elapsed();
        log::info!(
            "Suite '{}': {} passing, {} failing",
            self.name,
            report.passed(),
            report.failed()
        );
        report
    }

    async fn run_case(&self, case: &SuiteCase, config: &HarnessConfig) -> CaseReport {
        let title = format!("{} {}", self.name, case.name);
        log::info!("Start of test: {}", title);

        let rng = TestRng::new_from_env_or_random();
        let started = Instant::now();

        let node = match TestNodeBuilder::new().with_config(config.clone()).build().await {
            Ok(node) => Arc::new(node),
            Err(e) => {
                return CaseReport {
                    name: case.name.clone(),
                    passed: false,
                    error: Some(format!("node setup failed: {:#}", e)),
                    duration: started.elapsed(),
                    seed: Some(rng.seed()),
                    artifact: None,
                }
            }
        };

        let ctx = SuiteContext {
            provider: ContractProvider::for_node(node.clone(), self.registry.clone()).await,
            accounts: node.chain().accounts().await,
            node: node.clone(),
            seed: rng.seed(),
        };

        let mut result = (case.body)(ctx).await;
        if result.is_ok() {
            result = invariants::check_all(node.chain())
                .await
                .context("chain invariant violated after the test");
        }
        let duration = started.elapsed();

        match result {
            Ok(()) => {
                log::info!("✓ {} ({:?})", title, duration);
                CaseReport {
                    name: case.name.clone(),
                    passed: true,
                    error: None,
                    duration,
                    seed: Some(rng.seed()),
                    artifact: None,
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                log::error!("✗ {}: {}", title, message);

                let artifact = match &config.failure_artifacts_dir {
                    Some(dir) => {
                        save_failure_artifact(&title, rng.seed(), &message, &node, dir).await
                    }
                    None => None,
                };

                CaseReport {
                    name: case.name.clone(),
                    passed: false,
                    error: Some(message),
                    duration,
                    seed: Some(rng.seed()),
                    artifact,
                }
            }
        }
    }
}

async fn save_failure_artifact(
    title: &str,
    seed: u64,
    message: &str,
    node: &TestNode,
    dir: &Path,
) -> Option<PathBuf> {
    let mut collector = ArtifactCollector::new(title);
    collector.set_rng_seed(seed);
    collector.set_failure_reason(message.to_string());
    collector.capture_log("ERROR", message);
    collector.capture_chain_state(node.chain()).await;

    match collector.save(dir).await {
        Ok(path) => Some(path),
        Err(e) => {
            log::warn!("Could not save failure artifact for {}: {:#}", title, e);
            None
        }
    }
}

/// Outcome of one case
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub name: String,
    pub passed: bool,
    /// Failure message, verbatim
    pub error: Option<String>,
    pub duration: Duration,
    pub seed: Option<u64>,
    /// Failure artifact written for this case
    pub artifact: Option<PathBuf>,
}

/// Outcome of a suite run
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub suite: String,
    pub cases: Vec<CaseReport>,
    pub duration: Duration,
}

impl SuiteReport {
    /// True when every case passed
    pub fn success(&self) -> bool {
        self.cases.iter().all(|case| case.passed)
    }

    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|case| case.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|case| case.name == name)
    }

    /// Print a mocha-style summary to stdout
    pub fn print(&self) {
        println!();
        println!("  {}", self.suite);

        let mut failure_index = 0;
        for case in &self.cases {
            if case.passed {
                println!("    ✓ {} ({}ms)", case.name, case.duration.as_millis());
            } else {
                failure_index += 1;
                println!("    {}) {}", failure_index, case.name);
            }
        }

        println!();
        println!(
            "  {} passing ({}ms)",
            self.passed(),
            self.duration.as_millis()
        );
        if self.failed() > 0 {
            println!("  {} failing", self.failed());
        }

        for (index, case) in self.cases.iter().filter(|c| !c.passed).enumerate() {
            println!();
            println!("  {}) {} {}:", index + 1, self.suite, case.name);
            for line in textwrap::wrap(case.error.as_deref().unwrap_or("unknown error"), 72) {
                println!("     {}", line);
            }
            if let Some(seed) = case.seed {
                println!("     seed: 0x{:016x}", seed);
            }
            if let Some(ref path) = case.artifact {
                println!("     artifact: {}", path.display());
            }
        }
        println!();
    }
}

async fn store_a_value(ctx: SuiteContext, value: U256) -> Result<()> {
    let storage = SimpleStorage::deploy(&ctx.provider).await?;
    storage.store(value).await?;
    let retrieved = storage.retrieve().await?;
    log::debug!("retrieve() returned {}", retrieved);
    RoundTripVerifier::verify(value, retrieved)?;
    Ok(())
}

/// The "Simple storage" suite: deploy, `store(value)`, `retrieve()` equals `value`
pub fn builtin_simple_storage_suite(value: U256) -> ContractSuite {
    ContractSuite::new("Simple storage").it("should store a value", move |ctx| {
        store_a_value(ctx, value).boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_builtin_suite_passes() {
        let report = builtin_simple_storage_suite(U256::from(10u64))
            .run(&HarnessConfig::default())
            .await;

        assert!(report.success());
        assert_eq!(report.suite, "Simple storage");
        assert_eq!(report.cases.len(), 1);
        assert_eq!(report.cases[0].name, "should store a value");
        assert!(report.case("should store a value").unwrap().seed.is_some());
    }

    #[tokio::test]
    async fn test_each_case_gets_a_fresh_node() {
        let seen_blocks = Arc::new(AtomicUsize::new(0));
        let counter = seen_blocks.clone();

        let suite = ContractSuite::new("Isolation")
            .it("first", |ctx| {
                async move {
                    SimpleStorage::deploy(&ctx.provider).await?;
                    Ok::<(), anyhow::Error>(())
                }
                .boxed()
            })
            .it("second", move |ctx| {
                let counter = counter.clone();
                async move {
                    let height = ctx.node.chain().block_number().await;
                    counter.store(height as usize, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                }
                .boxed()
            });

        let report = suite.run(&HarnessConfig::default()).await;
        assert!(report.success());
        assert_eq!(seen_blocks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_saved() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            failure_artifacts_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        let suite = ContractSuite::new("Simple storage")
            .it("should notice a wrong value", |ctx| {
                async move {
                    let storage = SimpleStorage::deploy(&ctx.provider).await?;
                    storage.store(U256::from(10u64)).await?;
                    RoundTripVerifier::verify(U256::from(11u64), storage.retrieve().await?)?;
                    Ok::<(), anyhow::Error>(())
                }
                .boxed()
            })
            .it("should still run later cases", |_ctx| {
                async { Ok::<(), anyhow::Error>(()) }.boxed()
            });

        let report = suite.run(&config).await;
        assert!(!report.success());
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);

        let failed = &report.cases[0];
        assert_eq!(
            failed.error.as_deref(),
            Some("Assertion failed: expected 11, got 10")
        );
        let path = failed.artifact.as_ref().unwrap();
        let artifact = ArtifactCollector::load(path).await.unwrap();
        assert_eq!(
            artifact.metadata.test_name,
            "Simple storage should notice a wrong value"
        );
        assert_eq!(artifact.metadata.rng_seed, failed.seed);
        assert_eq!(artifact.chain_state.unwrap().contracts[0].storage["0"], "10");

        report.print();
    }

    #[tokio::test]
    async fn test_missing_artifacts_dir_fails_every_case() {
        let config = HarnessConfig {
            artifacts_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        let report = builtin_simple_storage_suite(U256::one()).run(&config).await;
        assert!(!report.success());
        assert!(report.cases[0].error.is_some());
    }
}

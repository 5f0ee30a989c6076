//! Property-based tests for chain operations
//!
//! # Key Properties Tested
//!
//! 1. **Round trip**: `retrieve()` after `store(v)` returns `v` for any 256-bit `v`
//! 2. **Nonce Monotonicity**: each confirmed transaction bumps the sender nonce by one
//! 3. **Gas Accounting**: balance + fees paid = genesis balance
//! 4. **Batch ≡ Sequential**: mining a batch yields the same state as mining one by one
//!
//! Failed cases can be reproduced with `PROPTEST_RNG_SEED`.

use crate::abi::Token;
use crate::primitives::{Address, U256};
use crate::tier1_component::runtime::simple_storage;
use crate::tier2_integration::{CallRequest, ChainRpc, TestNode, TestNodeBuilder, TransactionRequest};
use anyhow::{Context, Result};
use futures::future::FutureExt;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn arb_u256() -> impl Strategy<Value = U256> {
    prop_oneof![
        Just(U256::zero()),
        Just(U256::MAX),
        any::<u64>().prop_map(U256::from),
        any::<[u8; 32]>().prop_map(|bytes| U256::from_big_endian(&bytes)),
    ]
}

async fn node(auto_mine: bool) -> Result<TestNode> {
    TestNodeBuilder::new()
        .with_funded_accounts(2)
        .with_auto_mine(auto_mine)
        .build()
        .await
}

async fn deploy(node: &TestNode, from: Address) -> Result<Address> {
    let hash = node
        .send_transaction(TransactionRequest::deploy(
            from,
            simple_storage::bytecode().to_vec(),
        ))
        .await?;
    if !node.chain().config().auto_mine {
        node.mine_block().await?;
    }
    node.get_transaction_receipt(&hash)
        .await?
        .and_then(|r| r.contract_address)
        .context("deployment produced no contract address")
}

fn store_request(from: Address, contract: Address, value: U256) -> Result<TransactionRequest> {
    let data = simple_storage::store_function().encode_input(&[Token::Uint(value)])?;
    Ok(TransactionRequest::call(from, contract, data))
}

async fn retrieve(node: &TestNode, contract: Address) -> Result<U256> {
    let data = simple_storage::retrieve_function().encode_input(&[])?;
    let output = node
        .call(CallRequest {
            from: None,
            to: contract,
            data,
            gas: None,
        })
        .await?;
    let tokens = simple_storage::retrieve_function().decode_output(&output)?;
    tokens
        .into_iter()
        .next()
        .and_then(|token| token.into_uint())
        .context("retrieve returned no uint256")
}

/// Compare two chains account by account
fn assert_state_equivalence(a: &TestNode, b: &TestNode) -> Result<(), String> {
    let accounts_a = a
        .chain()
        .accounts_kv()
        .now_or_never()
        .ok_or("chain state locked")?;
    let accounts_b = b
        .chain()
        .accounts_kv()
        .now_or_never()
        .ok_or("chain state locked")?;

    if accounts_a != accounts_b {
        return Err(format!(
            "Account state mismatch: {:?} vs {:?}",
            accounts_a, accounts_b
        ));
    }

    let contracts_a = a.chain().contracts().now_or_never().ok_or("chain state locked")?;
    let contracts_b = b.chain().contracts().now_or_never().ok_or("chain state locked")?;
    let storage_a: Vec<_> = contracts_a.iter().map(|c| (c.address, &c.storage)).collect();
    let storage_b: Vec<_> = contracts_b.iter().map(|c| (c.address, &c.storage)).collect();
    if storage_a != storage_b {
        return Err("Contract storage mismatch".to_string());
    }

    Ok(())
}

fn fail(e: anyhow::Error) -> TestCaseError {
    TestCaseError::fail(format!("{:#}", e))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the stored value is the retrieved value
    #[test]
    fn prop_store_retrieve_round_trip(value in arb_u256()) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let node = node(true).await.map_err(fail)?;
            let alice = node.accounts().await.map_err(|e| fail(e.into()))?[0];
            let contract = deploy(&node, alice).await.map_err(fail)?;

            let request = store_request(alice, contract, value).map_err(fail)?;
            node.send_transaction(request).await.map_err(|e| fail(e.into()))?;

            let retrieved = retrieve(&node, contract).await.map_err(fail)?;
            prop_assert_eq!(retrieved, value);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: last write wins
    #[test]
    fn prop_last_write_wins(values in proptest::collection::vec(arb_u256(), 1..8)) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let node = node(true).await.map_err(fail)?;
            let alice = node.accounts().await.map_err(|e| fail(e.into()))?[0];
            let contract = deploy(&node, alice).await.map_err(fail)?;

            for value in &values {
                let request = store_request(alice, contract, *value).map_err(fail)?;
                node.send_transaction(request).await.map_err(|e| fail(e.into()))?;
            }

            let retrieved = retrieve(&node, contract).await.map_err(fail)?;
            prop_assert_eq!(Some(&retrieved), values.last());
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: nonce monotonicity and gas accounting
    #[test]
    fn prop_nonce_and_gas_accounting(values in proptest::collection::vec(arb_u256(), 1..10)) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let node = node(true).await.map_err(fail)?;
            let alice = node.accounts().await.map_err(|e| fail(e.into()))?[0];
            let contract = deploy(&node, alice).await.map_err(fail)?;

            let mut prev_nonce = node.get_nonce(&alice).await.map_err(|e| fail(e.into()))?;
            for value in &values {
                let request = store_request(alice, contract, *value).map_err(fail)?;
                node.send_transaction(request).await.map_err(|e| fail(e.into()))?;

                let nonce = node.get_nonce(&alice).await.map_err(|e| fail(e.into()))?;
                prop_assert_eq!(nonce, prev_nonce + 1);
                prev_nonce = nonce;
            }

            let chain = node.chain();
            prop_assert_eq!(
                chain.get_balance(&alice).await + chain.gas_spent(&alice).await,
                chain.genesis_balance(&alice).await
            );
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: batch mining ≡ sequential mining
    #[test]
    fn prop_batch_equals_sequential(values in proptest::collection::vec(arb_u256(), 1..6)) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let sequential = node(true).await.map_err(fail)?;
            let batched = node(false).await.map_err(fail)?;

            for node in [&sequential, &batched] {
                let alice = node.accounts().await.map_err(|e| fail(e.into()))?[0];
                let contract = deploy(node, alice).await.map_err(fail)?;
                for value in &values {
                    let request = store_request(alice, contract, *value).map_err(fail)?;
                    node.send_transaction(request).await.map_err(|e| fail(e.into()))?;
                }
                if !node.chain().config().auto_mine {
                    node.mine_block().await.map_err(|e| fail(e.into()))?;
                }
            }

            assert_state_equivalence(&sequential, &batched).map_err(TestCaseError::fail)?;
            Ok::<(), TestCaseError>(())
        })?;
    }
}

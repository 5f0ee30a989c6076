//! RPC assertion helpers for integration testing
//!
//! Assertions over node state read through `ChainRpc`, with messages that say
//! what was expected and what the node actually reported.

use crate::primitives::{Address, Hash, U256};
use crate::tier2_integration::ChainRpc;
use anyhow::{Context, Result};

/// Assert that the node is at the expected block number
///
/// # Example
///
/// ```rust,ignore
/// assert_block_number(&node, 2).await?;
/// ```
pub async fn assert_block_number<N: ChainRpc + ?Sized>(node: &N, expected: u64) -> Result<()> {
    let actual = node
        .block_number()
        .await
        .context("Failed to get block number")?;

    if actual != expected {
        anyhow::bail!(
            "Block number mismatch: expected {}, got {}",
            expected,
            actual
        );
    }

    Ok(())
}

/// Assert that an account holds exactly `expected` wei
pub async fn assert_balance<N: ChainRpc + ?Sized>(
    node: &N,
    address: &Address,
    expected: U256,
) -> Result<()> {
    let actual = node
        .get_balance(address)
        .await
        .with_context(|| format!("Failed to get balance for address {}", address))?;

    if actual != expected {
        anyhow::bail!(
            "Balance mismatch for address {}: expected {}, got {}",
            address,
            expected,
            actual
        );
    }

    Ok(())
}

/// Assert that an account has sent exactly `expected` confirmed transactions
pub async fn assert_nonce<N: ChainRpc + ?Sized>(
    node: &N,
    address: &Address,
    expected: u64,
) -> Result<()> {
    let actual = node
        .get_nonce(address)
        .await
        .with_context(|| format!("Failed to get nonce for address {}", address))?;

    if actual != expected {
        anyhow::bail!(
            "Nonce mismatch for address {}: expected {}, got {}",
            address,
            expected,
            actual
        );
    }

    Ok(())
}

/// Assert that a contract with the given code hash is deployed at `address`
pub async fn assert_contract_deployed<N: ChainRpc + ?Sized>(
    node: &N,
    address: &Address,
    expected_code_hash: &Hash,
) -> Result<()> {
    let actual = node
        .get_code_hash(address)
        .await
        .with_context(|| format!("Failed to get code at address {}", address))?;

    match actual {
        Some(hash) if &hash == expected_code_hash => Ok(()),
        Some(hash) => anyhow::bail!(
            "Code hash mismatch at {}: expected {}, got {}",
            address,
            expected_code_hash,
            hash
        ),
        None => anyhow::bail!("No contract deployed at {}", address),
    }
}

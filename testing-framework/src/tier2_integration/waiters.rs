// File: testing-framework/src/tier2_integration/waiters.rs
//
// Waiter Primitives
//
// Poll a node until a condition holds or a deadline passes. Deadlines and
// poll sleeps run on tokio time, so paused-time tests never really wait.

use crate::orchestrator::Clock;
use crate::primitives::Hash;
use crate::tier1_component::TransactionReceipt;
use crate::tier2_integration::{ChainRpc, RpcError};
use thiserror::Error;
use tokio::time::Duration;

/// Default interval between polls for `wait_for_block`
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Wait until the transaction `hash` has a receipt
///
/// Polls every `poll` on `clock`; RPC failures end the wait immediately.
///
/// # Example
///
/// ```rust,ignore
/// let hash = node.send_transaction(request).await?;
/// let receipt = wait_for_receipt(&node, &hash, timeouts.confirmation(),
///     timeouts.poll_interval(), node.clock().as_ref()).await?;
/// ```
pub async fn wait_for_receipt<R: ChainRpc + ?Sized>(
    rpc: &R,
    hash: &Hash,
    timeout: Duration,
    poll: Duration,
    clock: &dyn Clock,
) -> Result<TransactionReceipt, WaitError> {
    let start = clock.now();
    loop {
        if let Some(receipt) = rpc.get_transaction_receipt(hash).await? {
            return Ok(receipt);
        }

        let elapsed = clock.now() - start;
        if elapsed >= timeout {
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("No receipt for {} after {:?}", hash, elapsed);
            }
            return Err(WaitError::Timeout {
                what: format!("receipt of transaction {}", hash),
                timeout,
            });
        }

        clock.sleep(poll.min(timeout - elapsed)).await;
    }
}

/// Wait until the node reaches at least block `height`
pub async fn wait_for_block<R: ChainRpc + ?Sized>(
    rpc: &R,
    height: u64,
    timeout: Duration,
) -> Result<u64, WaitError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let current = rpc.block_number().await?;
        if current >= height {
            return Ok(current);
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(WaitError::Timeout {
                what: format!("block {} (at {})", height, current),
                timeout,
            });
        }

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

// File: testing-framework/src/orchestrator/clock.rs
//
// Clock Abstraction
//
// Block timestamps, receipt polling and simulated node latency all go through
// this trait, so tests can pause tokio time and step it explicitly.

use std::future::Future;
use std::pin::Pin;
use tokio::time::{self, Duration, Instant};

/// Clock abstraction trait - chain, node and waiters depend on this trait
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use tokio::time::Duration;
/// use storage_testing_framework::orchestrator::clock::{Clock, PausedClock};
///
/// #[tokio::test(start_paused = true)]
/// async fn test_with_paused_time() {
///     let clock = Arc::new(PausedClock::new());
///     let start = clock.now();
///
///     clock.advance(Duration::from_secs(3600)).await;
///
///     assert_eq!(clock.now() - start, Duration::from_secs(3600));
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current instant in time
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration
    ///
    /// With `SystemClock` this really waits. With `PausedClock` it cooperates
    /// with `tokio::time::pause()`: the sleep completes once time is advanced
    /// past it (or the runtime auto-advances because every task is idle).
    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// System real-time clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Paused clock (test environment)
///
/// Works with tokio's `time::pause()`: time only moves when advanced, or when
/// the runtime has nothing left to do but wait on a timer.
///
/// # Important Notes
///
/// 1. Use `#[tokio::test(start_paused = true)]`, or let `PausedClock::new()`
///    pause the current-thread runtime
/// 2. A confirmation timeout on a chain that never mines elapses instantly
///    under paused time, which keeps timeout tests fast
pub struct PausedClock;

impl PausedClock {
    /// Creates a new PausedClock and pauses tokio time
    ///
    /// Must be called from within a current-thread tokio runtime.
    pub fn new() -> Self {
        time::pause();
        Self
    }

    /// Clock over a runtime whose time is already paused
    ///
    /// For `#[tokio::test(start_paused = true)]`, or to hand out more clocks
    /// after `new()` has paused the runtime once. `tokio::time::pause` panics
    /// when time is already frozen.
    pub fn attach() -> Self {
        Self
    }

    /// Manually advance time by the specified duration
    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

impl Default for PausedClock {
    fn default() -> Self {
        Self::new()
    }
}

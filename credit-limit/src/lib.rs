//! # credit-limit
//!
//! `credit-limit` is a client-side admission control layer for APIs that enforce
//! a quota per rolling time interval, either as a plain request count or as a
//! weighted "credit" budget (compute units, request units, ...).
//!
//! ## Core Philosophy
//!
//! Upstream APIs measure their window in wall-clock time, not in completed calls.
//! So capacity consumed by an admission is not handed back when the call finishes:
//! it is handed back one `delay` after the admission, by a release task spawned at
//! the moment the capacity was taken. This approximates the upstream rolling window
//! with a single counter per pool instead of a timestamp per in-flight request.
//!
//! ## Key Concepts
//!
//! * **Pool**: shared capacity `C`. Each admission consumes a weight `w`
//!   (`w = 1` for the [`CountLimiter`]).
//! * **Admission**: atomic check-and-decrement. Waiting for capacity never mutates state,
//!   so abandoning the wait is always safe.
//! * **Deferred Release**: exactly one release per admission, fired `delay` later,
//!   whatever happens to the protected operation.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! use credit_limit::CreditLimiter;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), credit_limit::LimitError> {
//! let max = NonZeroUsize::new(200).unwrap();
//! let limiter = CreditLimiter::new(max, Duration::from_secs(1))?;
//!
//! // Costs 40 credits, returned one second after admission.
//! let answer = limiter.scope(40, async { 42 }).await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod config;
mod count;
mod credit;
mod error;
mod limiter;
mod permit;

#[cfg(test)]
mod test_support;

pub use config::LimiterConfig;
pub use count::CountLimiter;
pub use count::CountPool;
pub use credit::CreditLimiter;
pub use credit::CreditPool;
pub use error::LimitError;
pub use limiter::Limiter;
pub use limiter::LimiterKind;
pub use permit::Permit;

/// Reasons why a pool refused an admission.
#[derive(Debug, PartialEq)]
pub(crate) enum Reason {
    Exhausted { available: usize },
}

/// Read-only view of a pool shared by every admission against one limiter.
///
/// A pool has a fixed capacity. Each admission consumes some weight from it, and
/// the same weight is given back by exactly one deferred release. Only the
/// limiters in this crate admit and release, so `available` stays within
/// `0..=capacity`.
///
/// Pools must be `Send` and `Sync`: they are shared through `Arc` by every
/// concurrent admission attempt and every pending release task.
///
/// Capacity cannot be handed back from outside the crate:
///
/// ```compile_fail
/// use std::num::NonZeroUsize;
/// use std::time::Duration;
///
/// use credit_limit::CreditLimiter;
/// use credit_limit::Pool;
///
/// let limiter = CreditLimiter::new(NonZeroUsize::new(100).unwrap(), Duration::from_secs(1)).unwrap();
/// limiter.pool().release(50);
/// ```
pub trait Pool: Debug + Send + Sync {
    /// Identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Total capacity per interval.
    fn capacity(&self) -> usize;

    /// Capacity that can be admitted right now.
    fn available(&self) -> usize;

    /// Time between an admission and the release of its weight.
    fn delay(&self) -> Duration;
}

/// The admission/release half of a pool.
pub(crate) trait Admit: Pool {
    /// Attempts to consume `weight` units without suspending.
    ///
    /// The check and the decrement form a single critical section: two
    /// concurrent callers can never both succeed on capacity that only fits one.
    /// Nothing is mutated when `Reason` is returned.
    fn try_acquire(&self, weight: usize) -> ControlFlow<Reason>;

    /// Returns `weight` units to the pool. Called once per admission.
    fn release(&self, weight: usize);
}

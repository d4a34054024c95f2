use std::future::Future;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::Admit;
use crate::LimitError;
use crate::LimiterConfig;
use crate::Permit;
use crate::Pool;
use crate::Reason;

/// Credit bookkeeping shared by every admission against one [`CreditLimiter`].
///
/// `available` only moves through two atomic operations: a compare-and-swap that
/// subtracts a weight if it fits, and an add that gives a weight back.
#[derive(Debug)]
pub struct CreditPool {
    name: String,
    available: AtomicUsize,
    max: usize,
    interval: Duration,
    delay: Duration,
}

impl CreditPool {
    fn new(name: String, config: &LimiterConfig) -> Self {
        Self {
            name,
            available: AtomicUsize::new(config.max().get()),
            max: config.max().get(),
            interval: config.interval(),
            delay: config.delay(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    // Less than 10% of the budget left.
    fn is_low(&self, available: usize) -> bool {
        available.saturating_mul(10) < self.max
    }
}

impl Pool for CreditPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> usize {
        self.max
    }

    fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

impl Admit for CreditPool {
    fn try_acquire(&self, weight: usize) -> ControlFlow<Reason> {
        let previous = self
            .available
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |available| {
                available.checked_sub(weight)
            });

        match previous {
            Ok(previous) => {
                if self.is_low(previous - weight) && !self.is_low(previous) {
                    tracing::debug!(
                        limiter = %self.name,
                        max_credits = self.max,
                        interval = ?self.interval,
                        available = previous - weight,
                        "credit limiter is using more than 90% of its budget"
                    );
                }
                ControlFlow::Continue(())
            }
            Err(available) => ControlFlow::Break(Reason::Exhausted { available }),
        }
    }

    fn release(&self, weight: usize) {
        let previous = self.available.fetch_add(weight, Ordering::SeqCst);
        debug_assert!(previous + weight <= self.max, "released more than admitted");
        if previous + weight == self.max {
            tracing::debug!(
                limiter = %self.name,
                max_credits = self.max,
                interval = ?self.interval,
                "credit limiter has fully recovered its budget"
            );
        }
    }
}

/// Limits the sum of request weights ("credits") admitted per rolling interval.
///
/// Waiting callers re-check the pool every `retry` period, so admission order under
/// contention follows scheduler wake order and is not FIFO.
///
/// Clones share the same pool. Separately constructed limiters are independent.
#[derive(Clone, Debug)]
pub struct CreditLimiter {
    pool: Arc<CreditPool>,
    retry: Duration,
    max_wait: Option<Duration>,
}

impl CreditLimiter {
    /// Creates a limiter allowing `max_credits` per `interval`.
    ///
    /// # Errors
    ///
    /// Returns `LimitError::ZeroInterval` if `interval` is zero.
    pub fn new(max_credits: NonZeroUsize, interval: Duration) -> Result<Self, LimitError> {
        Self::from_config(LimiterConfig::new(max_credits, interval))
    }

    /// Creates a limiter from a full [`LimiterConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config does not validate.
    pub fn from_config(config: LimiterConfig) -> Result<Self, LimitError> {
        config.validate()?;
        let pool = CreditPool::new(config.resolve_name(), &config);
        Ok(Self {
            pool: Arc::new(pool),
            retry: config.retry(),
            max_wait: config.max_wait(),
        })
    }

    pub fn name(&self) -> &str {
        self.pool.name()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn available(&self) -> usize {
        self.pool.available()
    }

    pub fn interval(&self) -> Duration {
        self.pool.interval()
    }

    pub fn delay(&self) -> Duration {
        self.pool.delay()
    }

    pub fn pool(&self) -> &Arc<CreditPool> {
        &self.pool
    }

    /// Waits until `credits` fit in the pool, then consumes them.
    ///
    /// The credits return to the pool one `delay` after admission. Dropping this
    /// future before it resolves leaves the pool untouched.
    ///
    /// # Errors
    ///
    /// Fails immediately for a zero weight or a weight above capacity, and with
    /// `LimitError::Timeout` if a `max_wait` is configured and exceeded.
    pub async fn acquire(&self, credits: usize) -> Result<Permit, LimitError> {
        self.check(credits)?;
        let runtime = Handle::try_current().map_err(|_| LimitError::NoRuntime)?;

        match self.max_wait {
            None => Ok(self.wait_for(credits, &runtime).await),
            Some(max_wait) => timeout(max_wait, self.wait_for(credits, &runtime))
                .await
                .map_err(|_| {
                    tracing::warn!(
                        limiter = %self.name(),
                        credits,
                        max_wait = ?max_wait,
                        "credit admission timed out"
                    );
                    LimitError::Timeout {
                        limiter: self.name().to_string(),
                        waited: max_wait,
                    }
                }),
        }
    }

    /// Consumes `credits` only if they fit right now.
    ///
    /// # Errors
    ///
    /// Returns `LimitError::Exhausted` if the pool is short, plus the weight and
    /// runtime errors of [`CreditLimiter::acquire`].
    pub fn try_acquire(&self, credits: usize) -> Result<Permit, LimitError> {
        self.check(credits)?;
        let runtime = Handle::try_current().map_err(|_| LimitError::NoRuntime)?;

        match self.pool.try_acquire(credits) {
            ControlFlow::Continue(()) => Ok(Permit::schedule(self.pool.clone(), credits, &runtime)),
            ControlFlow::Break(Reason::Exhausted { available }) => {
                Err(LimitError::Exhausted { available })
            }
        }
    }

    /// Runs `fut` once `credits` have been admitted.
    ///
    /// The output of `fut`, success or failure, is handed back untouched.
    ///
    /// # Errors
    ///
    /// Returns the admission error if `fut` could not be started.
    pub async fn scope<F>(&self, credits: usize, fut: F) -> Result<F::Output, LimitError>
    where
        F: Future,
    {
        let _permit = self.acquire(credits).await?;
        Ok(fut.await)
    }

    fn check(&self, credits: usize) -> Result<(), LimitError> {
        if credits == 0 {
            return Err(LimitError::ZeroWeight);
        }
        if credits > self.capacity() {
            return Err(LimitError::WeightExceedsCapacity {
                weight: credits,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    async fn wait_for(&self, credits: usize, runtime: &Handle) -> Permit {
        loop {
            if self.pool.try_acquire(credits).is_continue() {
                return Permit::schedule(self.pool.clone(), credits, runtime);
            }
            sleep(self.retry).await;
        }
    }
}

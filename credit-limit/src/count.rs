use std::future::Future;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::sync::TryAcquireError;
use tokio::time::timeout;

use crate::Admit;
use crate::LimitError;
use crate::LimiterConfig;
use crate::Permit;
use crate::Pool;
use crate::Reason;

/// Request slots shared by every admission against one [`CountLimiter`].
///
/// Slots live in a tokio [`Semaphore`], which queues waiters instead of making
/// them poll. Admitted slots are detached from the semaphore and handed back with
/// `add_permits` by the deferred release. `outstanding` mirrors the detached slots
/// so saturation diagnostics fire on edges only.
#[derive(Debug)]
pub struct CountPool {
    name: String,
    semaphore: Semaphore,
    outstanding: AtomicUsize,
    max: usize,
    interval: Duration,
    delay: Duration,
}

impl CountPool {
    fn new(name: String, config: &LimiterConfig) -> Self {
        Self {
            name,
            semaphore: Semaphore::new(config.max().get()),
            outstanding: AtomicUsize::new(0),
            max: config.max().get(),
            interval: config.interval(),
            delay: config.delay(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of admitted slots not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    async fn admit(&self) -> Result<(), LimitError> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| LimitError::Closed)?;
        permit.forget();
        self.on_admit(1);
        Ok(())
    }

    fn on_admit(&self, weight: usize) {
        let previous = self.outstanding.fetch_add(weight, Ordering::SeqCst);
        if previous < self.max && previous + weight >= self.max {
            tracing::debug!(
                limiter = %self.name,
                max_count = self.max,
                interval = ?self.interval,
                "rate limiter has reached its limit"
            );
        }
    }
}

impl Pool for CountPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> usize {
        self.max
    }

    fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

impl Admit for CountPool {
    fn try_acquire(&self, weight: usize) -> ControlFlow<Reason> {
        let exhausted = || {
            ControlFlow::Break(Reason::Exhausted {
                available: self.semaphore.available_permits(),
            })
        };
        let Ok(units) = u32::try_from(weight) else {
            return exhausted();
        };

        match self.semaphore.try_acquire_many(units) {
            Ok(permit) => {
                permit.forget();
                self.on_admit(weight);
                ControlFlow::Continue(())
            }
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => exhausted(),
        }
    }

    fn release(&self, weight: usize) {
        // Counter first: a waiter woken by add_permits must see the slot as free.
        let previous = self.outstanding.fetch_sub(weight, Ordering::SeqCst);
        if previous >= self.max && previous - weight < self.max {
            tracing::debug!(
                limiter = %self.name,
                max_count = self.max,
                interval = ?self.interval,
                "rate limiter is back under its limit"
            );
        }
        self.semaphore.add_permits(weight);
    }
}

/// Limits the number of requests admitted per rolling interval.
///
/// Waiters queue on a tokio semaphore. Tokio serves them in FIFO order today, but
/// admission order is not part of this limiter's contract.
///
/// Clones share the same pool. Separately constructed limiters are independent.
#[derive(Clone, Debug)]
pub struct CountLimiter {
    pool: Arc<CountPool>,
    max_wait: Option<Duration>,
}

impl CountLimiter {
    /// Creates a limiter allowing `max_count` requests per `interval`.
    ///
    /// # Errors
    ///
    /// Returns `LimitError::ZeroInterval` if `interval` is zero.
    pub fn new(max_count: NonZeroUsize, interval: Duration) -> Result<Self, LimitError> {
        Self::from_config(LimiterConfig::new(max_count, interval))
    }

    /// Creates a limiter from a full [`LimiterConfig`].
    ///
    /// The retry period of the config is unused: waiters are woken by releases.
    ///
    /// # Errors
    ///
    /// Returns an error if the config does not validate, or if `max` is beyond what
    /// a tokio semaphore can hold.
    pub fn from_config(config: LimiterConfig) -> Result<Self, LimitError> {
        config.validate()?;
        if config.max().get() > Semaphore::MAX_PERMITS {
            return Err(LimitError::CapacityTooLarge {
                capacity: config.max().get(),
                limit: Semaphore::MAX_PERMITS,
            });
        }
        let pool = CountPool::new(config.resolve_name(), &config);
        Ok(Self {
            pool: Arc::new(pool),
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

    pub fn pool(&self) -> &Arc<CountPool> {
        &self.pool
    }

    /// Waits for a free slot and takes it.
    ///
    /// The slot returns to the pool one `delay` after admission. Dropping this
    /// future before it resolves leaves the pool untouched.
    ///
    /// # Errors
    ///
    /// Returns `LimitError::Timeout` if a `max_wait` is configured and exceeded.
    pub async fn acquire(&self) -> Result<Permit, LimitError> {
        let runtime = Handle::try_current().map_err(|_| LimitError::NoRuntime)?;

        let admitted = match self.max_wait {
            None => self.pool.admit().await,
            Some(max_wait) => timeout(max_wait, self.pool.admit()).await.map_err(|_| {
                tracing::warn!(
                    limiter = %self.name(),
                    max_wait = ?max_wait,
                    "request admission timed out"
                );
                LimitError::Timeout {
                    limiter: self.name().to_string(),
                    waited: max_wait,
                }
            })?,
        };
        admitted.map(|()| Permit::schedule(self.pool.clone(), 1, &runtime))
    }

    /// Takes a slot only if one is free right now.
    ///
    /// # Errors
    ///
    /// Returns `LimitError::Exhausted` if every slot is taken.
    pub fn try_acquire(&self) -> Result<Permit, LimitError> {
        let runtime = Handle::try_current().map_err(|_| LimitError::NoRuntime)?;

        match self.pool.try_acquire(1) {
            ControlFlow::Continue(()) => Ok(Permit::schedule(self.pool.clone(), 1, &runtime)),
            ControlFlow::Break(Reason::Exhausted { available }) => {
                Err(LimitError::Exhausted { available })
            }
        }
    }

    /// Runs `fut` once a slot has been admitted.
    ///
    /// The output of `fut`, success or failure, is handed back untouched.
    ///
    /// # Errors
    ///
    /// Returns the admission error if `fut` could not be started.
    pub async fn scope<F>(&self, fut: F) -> Result<F::Output, LimitError>
    where
        F: Future,
    {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }
}

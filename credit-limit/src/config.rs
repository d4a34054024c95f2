use std::num::NonZeroUsize;
use std::time::Duration;

use crate::LimitError;

const DEFAULT_RETRY: Duration = Duration::from_millis(100);

/// Settings shared by [`CreditLimiter`](crate::CreditLimiter) and
/// [`CountLimiter`](crate::CountLimiter).
///
/// `max` is interpreted as credits for a credit limiter and as requests for a
/// count limiter.
#[derive(Clone, Debug)]
pub struct LimiterConfig {
    max: NonZeroUsize,
    interval: Duration,
    adjustment: Duration,
    name: Option<String>,
    retry: Duration,
    max_wait: Option<Duration>,
}

impl LimiterConfig {
    /// Creates a config allowing `max` per `interval`.
    ///
    /// # Arguments
    ///
    /// * `max` - The budget available within a single interval.
    /// * `interval` - The length of the upstream rolling window.
    pub fn new(max: NonZeroUsize, interval: Duration) -> Self {
        Self {
            max,
            interval,
            adjustment: Duration::ZERO,
            name: None,
            retry: DEFAULT_RETRY,
            max_wait: None,
        }
    }

    /// Creates a config allowing `max` per second.
    pub fn per_second(max: NonZeroUsize) -> Self {
        Self::new(max, Duration::from_secs(1))
    }

    /// Return consumed capacity `adjustment` earlier than one full interval.
    ///
    /// This compensates for network latency between the caller and the upstream
    /// clock. The caller is responsible for keeping it small enough that the
    /// upstream window is not exceeded.
    pub fn with_adjustment(mut self, adjustment: Duration) -> Self {
        self.adjustment = adjustment;
        self
    }

    /// Set the name used in diagnostics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set how often a waiting credit admission re-checks the pool.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Bound the time an admission may wait for capacity.
    ///
    /// If the bound is exceeded, the admission fails with `LimitError::Timeout`.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn max(&self) -> NonZeroUsize {
        self.max
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn adjustment(&self) -> Duration {
        self.adjustment
    }

    pub fn retry(&self) -> Duration {
        self.retry
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// The time after which consumed capacity is returned: `interval - adjustment`,
    /// floored at zero.
    pub fn delay(&self) -> Duration {
        self.interval.saturating_sub(self.adjustment)
    }

    /// Checks the invariants a limiter relies on.
    ///
    /// # Errors
    ///
    /// Returns `LimitError::ZeroInterval` or `LimitError::ZeroRetry`.
    pub fn validate(&self) -> Result<(), LimitError> {
        if self.interval.is_zero() {
            return Err(LimitError::ZeroInterval);
        }
        if self.retry.is_zero() {
            return Err(LimitError::ZeroRetry);
        }
        Ok(())
    }

    /// The configured name, or a freshly generated unique id.
    pub(crate) fn resolve_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{:016x}", rand::random::<u64>()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(max: usize, interval: Duration) -> LimiterConfig {
        LimiterConfig::new(NonZeroUsize::new(max).unwrap(), interval)
    }

    #[test]
    fn it_defaults_delay_to_interval() {
        let config = config_for(10, Duration::from_secs(1));
        assert_eq!(config.delay(), Duration::from_secs(1));
        assert_eq!(config.retry(), Duration::from_millis(100));
        assert_eq!(config.max_wait(), None);
    }

    #[test]
    fn it_subtracts_adjustment() {
        let config = config_for(10, Duration::from_secs(1)).with_adjustment(Duration::from_millis(150));
        assert_eq!(config.delay(), Duration::from_millis(850));
    }

    #[test]
    fn it_floors_delay_at_zero() {
        let config = config_for(10, Duration::from_millis(100)).with_adjustment(Duration::from_secs(1));
        assert_eq!(config.delay(), Duration::ZERO);
    }

    #[test]
    fn it_rejects_zero_interval() {
        assert_eq!(
            config_for(10, Duration::ZERO).validate(),
            Err(LimitError::ZeroInterval)
        );
    }

    #[test]
    fn it_rejects_zero_retry() {
        let config = config_for(10, Duration::from_secs(1)).with_retry(Duration::ZERO);
        assert_eq!(config.validate(), Err(LimitError::ZeroRetry));
    }

    #[test]
    fn test_generated_names_are_unique() {
        let config = config_for(10, Duration::from_secs(1));
        let a = config.resolve_name();
        let b = config.resolve_name();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_explicit_name_wins() {
        let config = config_for(10, Duration::from_secs(1)).with_name("etherscan");
        assert_eq!(config.resolve_name(), "etherscan");
    }
}

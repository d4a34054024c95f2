use std::fmt;
use std::time::Duration;

use crate::CountLimiter;
use crate::CreditLimiter;

/// Which admission policy a [`Limiter`] applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimiterKind {
    Credit,
    Count,
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => f.write_str("credit limiter"),
            Self::Count => f.write_str("count limiter"),
        }
    }
}

/// Either kind of limiter, for code that picks one at runtime.
#[derive(Clone, Debug)]
pub enum Limiter {
    Credit(CreditLimiter),
    Count(CountLimiter),
}

impl Limiter {
    pub fn kind(&self) -> LimiterKind {
        match self {
            Self::Credit(_) => LimiterKind::Credit,
            Self::Count(_) => LimiterKind::Count,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Credit(l) => l.name(),
            Self::Count(l) => l.name(),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            Self::Credit(l) => l.capacity(),
            Self::Count(l) => l.capacity(),
        }
    }

    pub fn available(&self) -> usize {
        match self {
            Self::Credit(l) => l.available(),
            Self::Count(l) => l.available(),
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            Self::Credit(l) => l.delay(),
            Self::Count(l) => l.delay(),
        }
    }

    pub fn as_credit(&self) -> Option<&CreditLimiter> {
        match self {
            Self::Credit(l) => Some(l),
            Self::Count(_) => None,
        }
    }

    pub fn as_count(&self) -> Option<&CountLimiter> {
        match self {
            Self::Credit(_) => None,
            Self::Count(l) => Some(l),
        }
    }
}

impl From<CreditLimiter> for Limiter {
    fn from(limiter: CreditLimiter) -> Self {
        Self::Credit(limiter)
    }
}

impl From<CountLimiter> for Limiter {
    fn from(limiter: CountLimiter) -> Self {
        Self::Count(limiter)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::LimiterConfig;

    #[test]
    fn it_reports_its_kind() {
        let config = LimiterConfig::per_second(NonZeroUsize::new(10).unwrap()).with_name("shared");
        let credit: Limiter = CreditLimiter::from_config(config.clone()).unwrap().into();
        let count: Limiter = CountLimiter::from_config(config).unwrap().into();

        assert_eq!(credit.kind(), LimiterKind::Credit);
        assert!(credit.as_credit().is_some());
        assert!(credit.as_count().is_none());

        assert_eq!(count.kind(), LimiterKind::Count);
        assert!(count.as_count().is_some());
        assert_eq!(count.name(), "shared");
        assert_eq!(count.capacity(), 10);
        assert_eq!(count.available(), 10);
        assert_eq!(count.delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let limiter: Limiter = CreditLimiter::new(NonZeroUsize::new(10).unwrap(), Duration::from_secs(1))
            .unwrap()
            .into();
        let clone = limiter.clone();

        let _permit = limiter.as_credit().unwrap().try_acquire(4).unwrap();

        assert_eq!(clone.available(), 6);
    }
}

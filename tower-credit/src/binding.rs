use std::fmt;
use std::future::Future;
use std::sync::Arc;

use credit_limit::CountLimiter;
use credit_limit::CreditLimiter;
use credit_limit::LimitError;
use credit_limit::Limiter;
use credit_limit::LimiterKind;
use credit_limit::Permit;

use crate::ConfigError;
use crate::ThrottleError;
use crate::layer::ThrottleLayer;

type Attribute<O> = Arc<dyn Fn(&O) -> Limiter + Send + Sync>;

enum Source<O> {
    Limiter(Limiter),
    Attribute(Attribute<O>),
}

impl<O> Clone for Source<O> {
    fn clone(&self) -> Self {
        match self {
            Self::Limiter(limiter) => Self::Limiter(limiter.clone()),
            Self::Attribute(attribute) => Self::Attribute(Arc::clone(attribute)),
        }
    }
}

/// A validated pairing of a limiter with the cost of each call.
///
/// The limiter is either given up front or looked up on an owner object `O` at
/// call time (for the middleware, `O` is the wrapped service). Built with
/// [`Binding::builder`].
pub struct Binding<O> {
    source: Source<O>,
    credits: Option<usize>,
}

impl<O> Clone for Binding<O> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            credits: self.credits,
        }
    }
}

impl<O> fmt::Debug for Binding<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Limiter(limiter) => limiter.name().to_string(),
            Source::Attribute(_) => "<attribute>".to_string(),
        };
        f.debug_struct("Binding")
            .field("source", &source)
            .field("credits", &self.credits)
            .finish()
    }
}

impl<O> Binding<O> {
    pub fn builder() -> BindingBuilder<O> {
        BindingBuilder {
            limiter: None,
            attribute: None,
            credits: None,
        }
    }

    /// Binds a count limiter. Always valid.
    pub fn count(limiter: CountLimiter) -> Self {
        Self {
            source: Source::Limiter(limiter.into()),
            credits: None,
        }
    }

    /// Binds a credit limiter with a non-zero cost per call.
    ///
    /// A cost above the limiter's capacity is reported by the limiter at call time.
    pub fn credits(limiter: CreditLimiter, credits: std::num::NonZeroUsize) -> Self {
        Self {
            source: Source::Limiter(limiter.into()),
            credits: Some(credits.get()),
        }
    }

    /// Finds the limiter for `owner` and checks that it matches the binding's cost.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::WrongKind` if an attribute resolved to the other kind
    /// of limiter.
    pub fn resolve(&self, owner: &O) -> Result<Admission, ConfigError> {
        let limiter = match &self.source {
            Source::Limiter(limiter) => limiter.clone(),
            Source::Attribute(attribute) => attribute(owner),
        };

        let admission = match (limiter, self.credits) {
            (Limiter::Credit(limiter), Some(credits)) => Admission::Credit { limiter, credits },
            (Limiter::Count(limiter), None) => Admission::Count(limiter),
            (found, Some(_)) => {
                return Err(wrong_kind(LimiterKind::Credit, found.kind()));
            }
            (found, None) => {
                return Err(wrong_kind(LimiterKind::Count, found.kind()));
            }
        };
        Ok(admission)
    }

    /// Runs `fut` inside a scoped acquisition on the limiter of `owner`.
    ///
    /// The output of `fut` is returned untouched, whether it reports success or not.
    ///
    /// # Errors
    ///
    /// Returns `ThrottleError` if the binding does not resolve or admission fails.
    pub async fn call<F>(&self, owner: &O, fut: F) -> Result<F::Output, ThrottleError>
    where
        F: Future,
    {
        let admission = self.resolve(owner)?;
        let _permit = admission.acquire().await?;
        Ok(fut.await)
    }

    /// Wraps services with this binding.
    pub fn into_layer(self) -> ThrottleLayer<O> {
        ThrottleLayer::new(self)
    }
}

fn wrong_kind(expected: LimiterKind, found: LimiterKind) -> ConfigError {
    tracing::warn!(%expected, %found, "attribute resolved to the wrong kind of limiter");
    ConfigError::WrongKind { expected, found }
}

/// Builder for [`Binding`].
///
/// Supply exactly one of [`limiter`](Self::limiter) or [`attribute`](Self::attribute).
/// Credit limiters need [`credits`](Self::credits); count limiters must not have any.
/// With an attribute, supplying credits selects a credit limiter, otherwise a
/// count limiter is expected. Zero credits counts as no credits.
pub struct BindingBuilder<O> {
    limiter: Option<Limiter>,
    attribute: Option<Attribute<O>>,
    credits: Option<usize>,
}

impl<O> BindingBuilder<O> {
    /// Use this limiter for every call.
    pub fn limiter(mut self, limiter: impl Into<Limiter>) -> Self {
        self.limiter = Some(limiter.into());
        self
    }

    /// Look the limiter up on the owner at every call.
    pub fn attribute<F>(mut self, attribute: F) -> Self
    where
        F: Fn(&O) -> Limiter + Send + Sync + 'static,
    {
        self.attribute = Some(Arc::new(attribute));
        self
    }

    /// Credits consumed by each call.
    pub fn credits(mut self, credits: usize) -> Self {
        self.credits = Some(credits);
        self
    }

    /// Validates the combination.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first rule that is broken.
    pub fn build(self) -> Result<Binding<O>, ConfigError> {
        let credits = self.credits.filter(|credits| *credits > 0);

        let source = match (self.limiter, self.attribute, credits) {
            (None, None, _) => Err(ConfigError::MissingLimiter),
            (Some(Limiter::Credit(_)), Some(_), Some(_)) => Err(ConfigError::CreditsWithAttribute),
            (Some(_), Some(_), _) => Err(ConfigError::AmbiguousLimiter),
            (Some(Limiter::Credit(_)), None, None) => Err(ConfigError::MissingCredits),
            (Some(Limiter::Count(_)), None, Some(_)) => Err(ConfigError::UnexpectedCredits),
            (Some(limiter), None, _) => Ok(Source::Limiter(limiter)),
            (None, Some(attribute), _) => Ok(Source::Attribute(attribute)),
        }
        .inspect_err(|err| tracing::warn!(%err, "invalid throttle binding"))?;

        Ok(Binding { source, credits })
    }
}

/// A limiter resolved for one call, with the cost that call will pay.
#[derive(Clone, Debug)]
pub enum Admission {
    Credit {
        limiter: CreditLimiter,
        credits: usize,
    },
    Count(CountLimiter),
}

impl Admission {
    pub fn limiter_name(&self) -> &str {
        match self {
            Self::Credit { limiter, .. } => limiter.name(),
            Self::Count(limiter) => limiter.name(),
        }
    }

    /// Waits for admission on the resolved limiter.
    ///
    /// # Errors
    ///
    /// Returns the limiter's `LimitError`.
    pub async fn acquire(&self) -> Result<Permit, LimitError> {
        match self {
            Self::Credit { limiter, credits } => limiter.acquire(*credits).await,
            Self::Count(limiter) => limiter.acquire().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use super::*;

    struct Client {
        limiter: Limiter,
    }

    fn credit() -> CreditLimiter {
        CreditLimiter::new(NonZeroUsize::new(200).unwrap(), Duration::from_secs(1)).unwrap()
    }

    fn count() -> CountLimiter {
        CountLimiter::new(NonZeroUsize::new(5).unwrap(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn it_requires_a_limiter_source() {
        let err = Binding::<Client>::builder().credits(40).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingLimiter);
    }

    #[test]
    fn it_rejects_credits_with_attribute() {
        let err = Binding::<Client>::builder()
            .limiter(credit())
            .attribute(|c: &Client| c.limiter.clone())
            .credits(40)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::CreditsWithAttribute);
    }

    #[test]
    fn it_rejects_limiter_and_attribute() {
        let err = Binding::<Client>::builder()
            .limiter(count())
            .attribute(|c: &Client| c.limiter.clone())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::AmbiguousLimiter);
    }

    #[test]
    fn it_requires_credits_for_credit_limiter() {
        let err = Binding::<Client>::builder()
            .limiter(credit())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingCredits);

        let err = Binding::<Client>::builder()
            .limiter(credit())
            .credits(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingCredits);
    }

    #[test]
    fn it_forbids_credits_for_count_limiter() {
        let err = Binding::<Client>::builder()
            .limiter(count())
            .credits(1)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::UnexpectedCredits);
    }

    #[test]
    fn test_attribute_kind_follows_credits() {
        let credit_binding = Binding::<Client>::builder()
            .attribute(|c: &Client| c.limiter.clone())
            .credits(40)
            .build()
            .unwrap();
        let count_binding = Binding::<Client>::builder()
            .attribute(|c: &Client| c.limiter.clone())
            .build()
            .unwrap();

        let counted = Client {
            limiter: count().into(),
        };
        let credited = Client {
            limiter: credit().into(),
        };

        assert!(matches!(
            credit_binding.resolve(&credited),
            Ok(Admission::Credit { credits: 40, .. })
        ));
        assert_eq!(
            credit_binding.resolve(&counted).unwrap_err(),
            ConfigError::WrongKind {
                expected: LimiterKind::Credit,
                found: LimiterKind::Count
            }
        );
        assert!(matches!(
            count_binding.resolve(&counted),
            Ok(Admission::Count(_))
        ));
        assert_eq!(
            count_binding.resolve(&credited).unwrap_err(),
            ConfigError::WrongKind {
                expected: LimiterKind::Count,
                found: LimiterKind::Credit
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_returns_operation_output() {
        let limiter = credit();
        let binding = Binding::<()>::credits(limiter.clone(), NonZeroUsize::new(50).unwrap());

        let out: Result<u8, &str> = binding.call(&(), async { Err("rejected upstream") }).await.unwrap();

        assert_eq!(out, Err("rejected upstream"));
        assert_eq!(limiter.available(), 150);
    }

    #[tokio::test]
    async fn test_wrong_kind_fails_before_admission() {
        let limiter = count();
        let binding = Binding::<Client>::builder()
            .attribute(|c: &Client| c.limiter.clone())
            .credits(10)
            .build()
            .unwrap();
        let client = Client {
            limiter: limiter.clone().into(),
        };

        let err = binding.call(&client, async {}).await.unwrap_err();

        assert!(matches!(err, ThrottleError::Config(ConfigError::WrongKind { .. })));
        assert_eq!(limiter.available(), 5);
    }
}

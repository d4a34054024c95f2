use credit_limit::LimitError;
use credit_limit::LimiterKind;

/// An invalid combination of binding arguments.
///
/// Raised when a [`Binding`](crate::Binding) is built, or when an attribute
/// resolves to the wrong kind of limiter. Either way no admission is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Neither a limiter nor an attribute was supplied.
    #[error("either a limiter or an attribute must be provided")]
    MissingLimiter,

    /// Both a limiter and an attribute were supplied.
    #[error("a limiter and an attribute cannot both be provided")]
    AmbiguousLimiter,

    /// A credit limiter was supplied without a per-call cost.
    #[error("a credit limiter needs the credits each call costs")]
    MissingCredits,

    /// A count limiter was supplied with a per-call cost.
    #[error("a count limiter does not take credits")]
    UnexpectedCredits,

    /// A credit limiter and credits were combined with an attribute.
    #[error("credits for an explicit credit limiter cannot be combined with an attribute")]
    CreditsWithAttribute,

    /// The attribute resolved to a limiter of the other kind.
    #[error("expected a {expected}, found a {found}")]
    WrongKind {
        /// The kind implied by the binding's credits.
        expected: LimiterKind,
        /// The kind the attribute resolved to.
        found: LimiterKind,
    },
}

/// Errors produced by the throttling middleware itself.
///
/// Errors of the wrapped operation are never converted into this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThrottleError {
    /// The binding is misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The limiter refused or timed out the admission.
    #[error(transparent)]
    Limit(#[from] LimitError),
}

use std::time::Duration;

/// Errors produced while configuring a limiter or admitting a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    /// A count limiter is backed by a tokio semaphore, which caps its size.
    #[error("capacity {capacity} exceeds the supported maximum of {limit}")]
    CapacityTooLarge {
        /// The requested capacity.
        capacity: usize,
        /// The largest supported capacity.
        limit: usize,
    },

    /// The rolling window must have a non-zero length.
    #[error("interval must be greater than zero")]
    ZeroInterval,

    /// The capacity poll period must have a non-zero length.
    #[error("retry period must be greater than zero")]
    ZeroRetry,

    /// A credit admission must cost at least one credit.
    #[error("request weight must be greater than zero")]
    ZeroWeight,

    /// The request can never fit in the pool, so it is refused instead of waiting forever.
    #[error("request weight {weight} exceeds the limiter capacity of {capacity}")]
    WeightExceedsCapacity {
        /// The weight that was requested.
        weight: usize,
        /// The configured capacity per interval.
        capacity: usize,
    },

    /// The request was not admitted within the configured `max_wait`.
    ///
    /// This is distinct from any failure of the protected operation, which never ran.
    #[error("limiter {limiter} did not admit the request within {waited:?}")]
    Timeout {
        /// Name of the limiter that timed out.
        limiter: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// A non-suspending admission found too little capacity.
    #[error("limiter capacity exhausted; {available} available")]
    Exhausted {
        /// Capacity that was available when the admission was refused.
        available: usize,
    },

    /// The count pool's semaphore was closed.
    ///
    /// No limiter in this crate closes its semaphore, so this is not returned
    /// today. It keeps the semaphore's acquire error typed instead of panicking.
    #[error("limiter has been closed")]
    Closed,

    /// Deferred releases are scheduled on tokio, so admission needs a runtime.
    #[error("admission requires a running tokio runtime")]
    NoRuntime,
}

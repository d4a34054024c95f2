use std::num::NonZeroUsize;

use credit_limit::CountLimiter;
use credit_limit::CreditLimiter;
use tower::Layer;
use tower::ServiceBuilder;
use tower::layer::util::Stack;
use tower::service_fn;
use tower::util::ServiceFn;

use crate::Binding;
use crate::ThrottleLayer;
use crate::ThrottleService;

/// Throttle a plain async function with `binding`.
pub fn throughput<F>(binding: Binding<ServiceFn<F>>, f: F) -> ThrottleService<ServiceFn<F>> {
    ThrottleLayer::new(binding).layer(service_fn(f))
}

/// Service Builder Extension with throttling layers for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Admit every call through a count limiter
    fn rate_limit_count<S>(self, limiter: CountLimiter) -> ServiceBuilder<Stack<ThrottleLayer<S>, L>>;

    /// Admit every call through a credit limiter, paying `credits` per call
    fn rate_limit_credits<S>(
        self,
        limiter: CreditLimiter,
        credits: NonZeroUsize,
    ) -> ServiceBuilder<Stack<ThrottleLayer<S>, L>>;

    /// Admit every call through an already validated binding
    fn throttle<S>(self, binding: Binding<S>) -> ServiceBuilder<Stack<ThrottleLayer<S>, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn rate_limit_count<S>(self, limiter: CountLimiter) -> ServiceBuilder<Stack<ThrottleLayer<S>, L>> {
        self.layer(ThrottleLayer::new(Binding::count(limiter)))
    }

    fn rate_limit_credits<S>(
        self,
        limiter: CreditLimiter,
        credits: NonZeroUsize,
    ) -> ServiceBuilder<Stack<ThrottleLayer<S>, L>> {
        self.layer(ThrottleLayer::new(Binding::credits(limiter, credits)))
    }

    fn throttle<S>(self, binding: Binding<S>) -> ServiceBuilder<Stack<ThrottleLayer<S>, L>> {
        self.layer(ThrottleLayer::new(binding))
    }
}

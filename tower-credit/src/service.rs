use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use opentelemetry::metrics::Histogram;
use tokio::time::Instant;
use tower::BoxError;
use tower::Service;

use crate::Binding;
use crate::ThrottleError;

#[derive(Clone)]
struct ThrottleServiceMetrics {
    admitted: Counter<u64>,
    rejected: Counter<u64>,
    admission_wait: Histogram<f64>,
}

impl ThrottleServiceMetrics {
    fn new() -> Self {
        let meter = global::meter("throttle_service");
        Self {
            admitted: meter.u64_counter("admitted").build(),
            rejected: meter.u64_counter("rejected").build(),
            admission_wait: meter.f64_histogram("admission_wait_seconds").build(),
        }
    }

    fn reject(&self, limiter: Option<&str>, err: &ThrottleError) {
        let reason = match err {
            ThrottleError::Config(_) => "config",
            ThrottleError::Limit(_) => "limit",
        };
        let mut attributes = vec![KeyValue::new("reason", reason)];
        if let Some(limiter) = limiter {
            attributes.push(KeyValue::new("limiter", limiter.to_string()));
        }
        self.rejected.add(1, &attributes);
    }
}

/// Admits each call through its [`Binding`] before handing it to the inner service.
///
/// The capacity taken by a call is returned one limiter delay after admission,
/// independent of how the inner call ends. Errors of the inner service are passed
/// through as they are.
pub struct ThrottleService<S> {
    inner: S,
    binding: Binding<S>,
    instruments: ThrottleServiceMetrics,
}

impl<S: fmt::Debug> fmt::Debug for ThrottleService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleService")
            .field("inner", &self.inner)
            .field("binding", &self.binding)
            .finish()
    }
}

impl<S: Clone> Clone for ThrottleService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            binding: self.binding.clone(),
            instruments: self.instruments.clone(),
        }
    }
}

impl<S> ThrottleService<S> {
    pub fn new(inner: S, binding: Binding<S>) -> Self {
        Self {
            inner,
            binding,
            instruments: ThrottleServiceMetrics::new(),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, Req> Service<Req> for ThrottleService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    S::Response: 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Resolve against the service that holds the limiter, before it moves.
        let admission = self.binding.resolve(&self.inner);

        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let instruments = self.instruments.clone();

        Box::pin(async move {
            let admission = admission
                .map_err(ThrottleError::from)
                .inspect_err(|err| instruments.reject(None, err))?;
            let limiter = KeyValue::new("limiter", admission.limiter_name().to_string());

            let wait_start = Instant::now();
            let _permit = admission
                .acquire()
                .await
                .map_err(ThrottleError::from)
                .inspect_err(|err| instruments.reject(Some(admission.limiter_name()), err))?;

            instruments.admitted.add(1, &[limiter.clone()]);
            instruments
                .admission_wait
                .record(wait_start.elapsed().as_secs_f64(), &[limiter]);

            inner.call(req).await.map_err(Into::into)
        })
    }
}

use tower::Layer;

use crate::Binding;
use crate::service::ThrottleService;

/// Applies scoped acquisition to every call of the wrapped service.
///
/// `O` is the type of the wrapped service, which is what an attribute binding
/// looks its limiter up on.
#[derive(Debug)]
pub struct ThrottleLayer<O> {
    binding: Binding<O>,
}

impl<O> Clone for ThrottleLayer<O> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
        }
    }
}

impl<O> ThrottleLayer<O> {
    /// Create a ThrottleLayer
    pub fn new(binding: Binding<O>) -> Self {
        ThrottleLayer { binding }
    }
}

impl<S> Layer<S> for ThrottleLayer<S> {
    type Service = ThrottleService<S>;

    fn layer(&self, service: S) -> Self::Service {
        ThrottleService::new(service, self.binding.clone())
    }
}

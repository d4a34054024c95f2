//! # Tower Credit
//!
//! `tower-credit` binds [`credit_limit`] limiters to asynchronous operations, so
//! that every call goes through scoped acquisition without the caller managing
//! permits: wait for capacity, run the call, and let the capacity come back one
//! limiter delay after admission.
//!
//! ## Bindings
//!
//! A [`Binding`] pairs a limiter with the cost of each call:
//!
//! 1. **Explicit limiter**: a [`credit_limit::CountLimiter`], or a
//!    [`credit_limit::CreditLimiter`] together with the credits each call costs.
//! 2. **Attribute**: a closure that finds the limiter on the wrapped object at call
//!    time. If it yields the wrong kind of limiter the call fails with
//!    [`ConfigError::WrongKind`] before any admission.
//!
//! Invalid combinations are rejected by [`BindingBuilder::build`].
//!
//! ## Middleware
//!
//! [`ThrottleLayer`] turns a binding into a `tower` layer. Any async function can be
//! throttled through `tower::service_fn`, see [`throughput`].
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! use credit_limit::CreditLimiter;
//! use tower::ServiceExt;
//! use tower_credit::Binding;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tower::BoxError> {
//! let limiter = CreditLimiter::new(NonZeroUsize::new(200).unwrap(), Duration::from_secs(1))?;
//! let binding = Binding::builder().limiter(limiter).credits(40).build()?;
//!
//! let svc = tower_credit::throughput(binding, |block: u64| async move {
//!     Ok::<_, tower::BoxError>(block + 1)
//! });
//! assert_eq!(svc.oneshot(41).await?, 42);
//! # Ok(())
//! # }
//! ```

mod binding;
mod error;
mod layer;
mod service;
mod utils;


pub use binding::Admission;
pub use binding::Binding;
pub use binding::BindingBuilder;
pub use error::ConfigError;
pub use error::ThrottleError;
pub use layer::ThrottleLayer;
pub use service::ThrottleService;
pub use utils::ServiceBuilderExt;
pub use utils::throughput;

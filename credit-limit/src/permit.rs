use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::sleep_until;

use crate::Admit;

/// Proof of one successful admission.
///
/// The release of the consumed weight is scheduled when the permit is created,
/// one `delay` after admission. It does not depend on the permit being kept,
/// dropped or leaked, nor on the outcome of the protected operation, so every
/// admission is paired with exactly one release.
///
/// If the runtime running the release task shuts down before `delay` has
/// elapsed, the weight is returned at that point instead, so a limiter that
/// outlives its runtime keeps its full capacity.
#[derive(Debug)]
pub struct Permit {
    limiter: String,
    weight: usize,
    release_at: Instant,
    release: JoinHandle<()>,
}

impl Permit {
    /// Spawns the deferred release for `weight` units already taken from `pool`.
    ///
    /// Must be called right after a successful admission, without an intervening
    /// suspension point.
    pub(crate) fn schedule<P>(pool: Arc<P>, weight: usize, runtime: &Handle) -> Self
    where
        P: Admit + ?Sized + 'static,
    {
        let release_at = Instant::now() + pool.delay();
        let limiter = pool.name().to_string();
        tracing::trace!(
            limiter = %limiter,
            weight,
            available = pool.available(),
            "admitted"
        );

        let mut guard = Release {
            pool,
            weight,
            done: false,
        };
        let release = runtime.spawn(async move {
            sleep_until(release_at).await;
            guard.fire();
        });

        Self {
            limiter,
            weight,
            release_at,
            release,
        }
    }

    /// Name of the limiter that issued this permit.
    pub fn limiter(&self) -> &str {
        &self.limiter
    }

    /// Weight consumed by this admission (1 for count limiters).
    pub fn weight(&self) -> usize {
        self.weight
    }

    /// When the consumed weight goes back to the pool.
    pub fn release_at(&self) -> Instant {
        self.release_at
    }

    /// Whether the consumed weight has already gone back to the pool.
    pub fn is_released(&self) -> bool {
        self.release.is_finished()
    }

    /// Waits until the consumed weight has gone back to the pool.
    pub async fn released(self) {
        // A cancelled task has already given the weight back from its guard.
        let _ = self.release.await;
    }
}

/// Gives `weight` back to `pool` exactly once: on schedule, or when the release
/// task is dropped without having run.
struct Release<P: Admit + ?Sized> {
    pool: Arc<P>,
    weight: usize,
    done: bool,
}

impl<P: Admit + ?Sized> Release<P> {
    fn fire(&mut self) {
        if !self.done {
            self.done = true;
            self.pool.release(self.weight);
        }
    }
}

impl<P: Admit + ?Sized> Drop for Release<P> {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(
                limiter = %self.pool.name(),
                weight = self.weight,
                "release task dropped before its delay; returning weight now"
            );
        }
        self.fire();
    }
}

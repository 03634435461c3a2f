//! Cancellation and deadlines of the operations that reach the satellite.

use crate::{error, Error, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Governs the lifetime of the operations issued through a [`Project`](crate::Project) or while
/// requesting an access grant.
///
/// A context is cheap to clone and all the clones share the same cancellation state, so a context
/// can be handed to a [`Project`](crate::Project) and canceled from another thread.
///
/// Every round-trip to the satellite checks the context before and after the call, and the
/// transports are expected to observe it while they're waiting, hence a canceled context makes
/// the in-flight operation return an [`error::Uplink::Canceled`] error promptly.
#[derive(Debug, Clone, Default)]
pub struct Context {
    canceled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates a context without deadline that is never canceled unless [`Self::cancel`] is
    /// called.
    pub fn background() -> Self {
        Self::default()
    }

    /// Creates a child context that shares the cancellation of `self` and whose deadline is the
    /// earliest of the one of `self` and `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            canceled: Arc::clone(&self.canceled),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    /// Cancels this context and all its clones and children.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Returns the deadline of this context if it has one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the context was canceled or its deadline elapsed.
    pub fn is_done(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns an [`error::Uplink::Canceled`] error if the context was canceled or its deadline
    /// elapsed.
    pub fn check(&self) -> Result<()> {
        if self.canceled.load(Ordering::SeqCst) {
            return Err(Error::new_uplink(error::Uplink::Canceled(String::from(
                "context canceled",
            ))));
        }

        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::new_uplink(error::Uplink::Canceled(String::from(
                "context deadline exceeded",
            ))));
        }

        Ok(())
    }

    /// Blocks the current thread for `duration` or until the context is done, whatever happens
    /// first. It returns an error if the context is done.
    ///
    /// It's used by transports which simulate the latency of the network.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        const TICK: Duration = Duration::from_millis(5);

        let until = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            std::thread::sleep(TICK.min(until - now));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cancel() {
        let ctx = Context::background();
        ctx.check().expect("background context isn't done");

        let child = ctx.with_timeout(Duration::from_secs(60));
        ctx.cancel();
        assert!(ctx.is_done(), "canceled context");
        assert!(child.is_done(), "child shares the cancellation");

        let err = child.check().expect_err("canceled child context");
        assert!(err.is_canceled(), "expected a canceled error, got: {}", err);
    }

    #[test]
    fn test_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(10));
        assert!(ctx.deadline().is_some(), "deadline");

        let err = ctx
            .sleep(Duration::from_secs(5))
            .expect_err("sleep beyond the deadline");
        assert!(err.is_canceled(), "expected a canceled error, got: {}", err);

        // A child can only shorten the deadline of its parent.
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(parent.deadline(), child.deadline(), "child deadline");
    }

    #[test]
    fn test_sleep() {
        let ctx = Context::background();
        let start = Instant::now();
        ctx.sleep(Duration::from_millis(20)).expect("sleep");
        assert!(start.elapsed() >= Duration::from_millis(20), "slept");
    }
}

//! A cancellable, revivable sleep used to pace the liveness loops.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::{sleep, Duration};

/// A timer whose sleeps can be interrupted and later re-armed.
///
/// One `Waiter` paces one periodic loop: the loop calls [`wait_for`] each
/// iteration and exits once it returns `false`. [`cancel`] latches the
/// timer so that every in-flight and subsequent wait reports cancellation;
/// [`revive`] unlatches it, allowing the owning client to be restarted
/// without reallocation.
///
/// [`wait_for`]: Waiter::wait_for
/// [`cancel`]: Waiter::cancel
/// [`revive`]: Waiter::revive
#[derive(Debug, Default)]
pub struct Waiter {
    cancelled: AtomicBool,
    wake: Notify,
}

impl Waiter {
    /// Creates a live (uncancelled) timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `duration`, returning `true` if the full duration
    /// elapsed and `false` if the timer was cancelled first.
    pub async fn wait_for(&self, duration: Duration) -> bool {
        let cancelled = self.wake.notified();
        tokio::pin!(cancelled);

        // Register for wakeups before reading the flag, so a concurrent
        // cancel() is never missed.
        cancelled.as_mut().enable();

        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }

        tokio::select! {
            () = sleep(duration) => !self.cancelled.load(Ordering::Acquire),
            () = &mut cancelled => false,
        }
    }

    /// Latches the timer: wakes all in-flight waits and makes every
    /// subsequent [`wait_for`] return `false` until [`revive`] is called.
    ///
    /// [`wait_for`]: Waiter::wait_for
    /// [`revive`]: Waiter::revive
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.wake.notify_waiters();
    }

    /// Unlatches the timer after a [`cancel`], so new waits may sleep again.
    ///
    /// [`cancel`]: Waiter::cancel
    pub fn revive(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

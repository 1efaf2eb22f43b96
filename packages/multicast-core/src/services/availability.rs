//! Edge-triggered "a device became free" signal.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Single boolean flag with wait/notify semantics.
///
/// Many trackers may [`set`](Self::set) it concurrently; one dispatcher
/// [`wait`](Self::wait)s on it. Setting an already-set flag is a no-op, and
/// `wait` returns only after a `set` that happened since the last
/// successful `wait` or [`clear`](Self::clear), consuming it.
#[derive(Debug, Default)]
pub struct AvailabilitySignal {
    flag: Mutex<bool>,
    notify: Notify,
}

impl AvailabilitySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes the waiter.
    pub fn set(&self) {
        let mut flag = self.flag.lock();
        if !*flag {
            *flag = true;
            self.notify.notify_waiters();
        }
    }

    /// Drops a pending set.
    pub fn clear(&self) {
        *self.flag.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.flag.lock()
    }

    /// Suspends until the flag is set, then clears it.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a set between the check and the
            // await is not lost.
            notified.as_mut().enable();

            if self.take() {
                return;
            }
            notified.await;
        }
    }

    fn take(&self) -> bool {
        let mut flag = self.flag.lock();
        std::mem::replace(&mut *flag, false)
    }
}

//! Single-shot, cancelable timeout guard.
//!
//! The guard never runs on its own thread. It records a deadline when armed
//! and the host's event loop asks it, via [`TimeoutGuard::poll`], whether the
//! deadline has passed. Because firing only happens inside `poll`, a
//! disarm followed by a re-arm can never be interleaved with a firing.

use std::time::{Duration, Instant};
use tracing::trace;

use crate::clock::{Clock, MonotonicClock};

#[derive(Debug)]
struct Pending<E> {
    // `None` when the timeout is too large to represent; such a guard never fires.
    deadline: Option<Instant>,
    timeout: Duration,
    event: E,
}

/// Timer that fires a typed event once, unless disarmed or re-armed first.
///
/// `E` identifies the callback the owner runs when the guard fires; the
/// update handler uses it to carry the chunk index the timeout belongs to.
///
/// # Example
///
/// ```rust
/// use ota_watchdog::{ManualClock, TimeoutGuard};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let mut guard = TimeoutGuard::with_clock(clock.clone());
///
/// guard.arm(Duration::from_secs(5), "chunk 3");
/// assert_eq!(guard.poll(), None);
///
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(guard.poll(), Some("chunk 3"));
/// assert_eq!(guard.poll(), None);
/// ```
#[derive(Debug)]
pub struct TimeoutGuard<E, C: Clock = MonotonicClock> {
    clock: C,
    pending: Option<Pending<E>>,
    armed_count: u64,
    fired_count: u64,
}

impl<E> TimeoutGuard<E, MonotonicClock> {
    /// Create a disarmed guard on the monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock)
    }
}

impl<E> Default for TimeoutGuard<E, MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, C: Clock> TimeoutGuard<E, C> {
    /// Create a disarmed guard on a custom clock.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            pending: None,
            armed_count: 0,
            fired_count: 0,
        }
    }

    /// Schedule `event` to fire once after `timeout`.
    ///
    /// A pending firing is replaced, never duplicated.
    pub fn arm(&mut self, timeout: Duration, event: E) {
        let deadline = self.clock.now().checked_add(timeout);
        self.pending = Some(Pending {
            deadline,
            timeout,
            event,
        });
        self.armed_count = self.armed_count.saturating_add(1);
        trace!(timeout_ms = timeout.as_millis(), "Timeout guard armed");
    }

    /// Cancel a pending firing. No-op when disarmed.
    pub fn disarm(&mut self) -> Option<E> {
        let pending = self.pending.take()?;
        trace!("Timeout guard disarmed");
        Some(pending.event)
    }

    /// Return the event if the deadline has been reached.
    ///
    /// The guard is disarmed by a firing, so each arm fires at most once.
    pub fn poll(&mut self) -> Option<E> {
        let due = self
            .pending
            .as_ref()
            .and_then(|p| p.deadline)
            .is_some_and(|deadline| self.clock.now() >= deadline);
        if !due {
            return None;
        }
        let pending = self.pending.take()?;
        self.fired_count = self.fired_count.saturating_add(1);
        trace!(
            timeout_ms = pending.timeout.as_millis(),
            "Timeout guard fired"
        );
        Some(pending.event)
    }

    /// Run `callback` with the event if the guard is due. Returns whether it fired.
    pub fn fire_if_due(&mut self, callback: impl FnOnce(E)) -> bool {
        match self.poll() {
            Some(event) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Whether a firing is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Instant of the pending firing.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and_then(|p| p.deadline)
    }

    /// Time left until the pending firing, zero once due.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = self.deadline()?;
        Some(deadline.saturating_duration_since(self.clock.now()))
    }

    /// Timeout the guard was last armed with, while armed.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.pending.as_ref().map(|p| p.timeout)
    }

    /// The pending event, if any.
    #[must_use]
    pub fn pending_event(&self) -> Option<&E> {
        self.pending.as_ref().map(|p| &p.event)
    }

    /// Number of times the guard has been armed.
    #[must_use]
    pub fn armed_count(&self) -> u64 {
        self.armed_count
    }

    /// Number of times the guard has fired.
    #[must_use]
    pub fn fired_count(&self) -> u64 {
        self.fired_count
    }

    /// The clock driving this guard.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

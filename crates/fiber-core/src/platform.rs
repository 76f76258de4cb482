//! Platform abstraction traits for the fiber runtime.
//!
//! The reconciler never decides on its own when to run. The host platform
//! tells it when an idle slot is available and how much of that slot is
//! left; these traits describe that contract without depending on `std`
//! timing APIs directly.

use std::time::Duration;

/// Requests work slices from the host platform.
///
/// Implementations are responsible for eventually calling
/// [`Renderer::work`](crate::Renderer::work) after [`schedule_work`] fired.
/// They must be safe to use from multiple threads.
///
/// [`schedule_work`]: RuntimeScheduler::schedule_work
pub trait RuntimeScheduler: Send + Sync {
    /// Ask the host to run the work loop at its next idle opportunity.
    fn schedule_work(&self);
}

/// Provides timing information for the runtime.
pub trait Clock: Send + Sync {
    /// Instant type produced by this clock implementation.
    type Instant: Copy + Send + Sync;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the time elapsed since `since`.
    fn elapsed(&self, since: Self::Instant) -> Duration;
}

/// Host-provided "how much idle time is left" oracle for one work slice.
pub trait IdleDeadline {
    fn time_remaining(&self) -> Duration;

    /// The loop yields once less than a millisecond of the slice is left.
    fn should_yield(&self) -> bool {
        self.time_remaining() < Duration::from_millis(1)
    }
}

/// Deadline that never expires. Used by [`Renderer::flush`](crate::Renderer::flush).
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl IdleDeadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Deadline backed by a [`Clock`] and a fixed budget measured from creation.
pub struct ClockDeadline<'a, C: Clock> {
    clock: &'a C,
    start: C::Instant,
    budget: Duration,
}

impl<'a, C: Clock> ClockDeadline<'a, C> {
    pub fn new(clock: &'a C, budget: Duration) -> Self {
        Self {
            start: clock.now(),
            clock,
            budget,
        }
    }
}

impl<C: Clock> IdleDeadline for ClockDeadline<'_, C> {
    fn time_remaining(&self) -> Duration {
        self.budget.saturating_sub(self.clock.elapsed(self.start))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    /// Clock that only moves when told to.
    #[derive(Default)]
    struct ManualClock {
        millis: AtomicU64,
    }

    impl ManualClock {
        fn advance(&self, millis: u64) {
            self.millis.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            self.millis.load(Ordering::SeqCst)
        }

        fn elapsed(&self, since: u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    #[test]
    fn clock_deadline_yields_in_the_last_millisecond() {
        let clock = ManualClock::default();
        clock.advance(100);
        let deadline = ClockDeadline::new(&clock, Duration::from_millis(4));
        assert_eq!(deadline.time_remaining(), Duration::from_millis(4));
        assert!(!deadline.should_yield());

        clock.advance(3);
        assert_eq!(deadline.time_remaining(), Duration::from_millis(1));
        assert!(!deadline.should_yield());

        clock.advance(5);
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
        assert!(deadline.should_yield());
    }

    #[test]
    fn unbounded_never_yields() {
        assert!(!Unbounded.should_yield());
    }
}

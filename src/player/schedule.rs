//! Retry bookkeeping of the poll loop, kept free of timers.

use std::time::Duration;

/// Consecutive failures after which a player is considered disconnected.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// Result of [`PollSchedule::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// No poll was in flight; the caller owns the new one.
    Started,
    /// A poll is already in flight; the failure counter was bumped instead.
    Busy,
}

/// What to do after a poll completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Poll again after the delay.
    Reschedule(Duration),
    /// Stop polling and mark the player disconnected.
    Disconnect,
}

/// Guards against overlapping polls and counts consecutive failures.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    max_failures: u32,
    failures: u32,
    in_flight: bool,
}

impl PollSchedule {
    /// Schedule polling every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_failures: MAX_CONSECUTIVE_FAILURES,
            failures: 0,
            in_flight: false,
        }
    }

    /// Claim the next poll.
    pub fn begin(&mut self) -> Begin {
        if self.in_flight {
            self.failures += 1;
            return Begin::Busy;
        }
        self.in_flight = true;
        Begin::Started
    }

    /// The poll succeeded.
    pub fn success(&mut self) -> Next {
        self.in_flight = false;
        self.failures = 0;
        self.reschedule()
    }

    /// The poll failed with a transient error.
    pub fn failure(&mut self) -> Next {
        self.in_flight = false;
        self.failures += 1;
        if self.failures >= self.max_failures {
            Next::Disconnect
        } else {
            self.reschedule()
        }
    }

    /// The poll completed without an outcome that affects the counter.
    pub fn skip(&mut self) -> Next {
        self.in_flight = false;
        self.reschedule()
    }

    /// Delay before the next poll.
    pub fn reschedule(&self) -> Next {
        Next::Reschedule(self.interval)
    }

    /// Clear the failure counter, e.g. after the player is seen again.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.in_flight = false;
    }

    /// Consecutive failures so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether a poll is in flight.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(1_000);

    #[test]
    fn second_consecutive_failure_disconnects() {
        let mut schedule = PollSchedule::new(INTERVAL);
        assert_eq!(schedule.begin(), Begin::Started);
        assert_eq!(schedule.failure(), Next::Reschedule(INTERVAL));
        assert_eq!(schedule.begin(), Begin::Started);
        assert_eq!(schedule.failure(), Next::Disconnect);
    }

    #[test]
    fn success_resets_the_counter() {
        let mut schedule = PollSchedule::new(INTERVAL);
        schedule.begin();
        schedule.failure();
        schedule.begin();
        assert_eq!(schedule.success(), Next::Reschedule(INTERVAL));
        assert_eq!(schedule.failures(), 0);
        schedule.begin();
        assert_eq!(schedule.failure(), Next::Reschedule(INTERVAL));
    }

    #[test]
    fn overlapping_trigger_bumps_counter() {
        let mut schedule = PollSchedule::new(INTERVAL);
        assert_eq!(schedule.begin(), Begin::Started);
        assert_eq!(schedule.begin(), Begin::Busy);
        assert_eq!(schedule.failures(), 1);
        assert!(schedule.is_in_flight());
        assert_eq!(schedule.failure(), Next::Disconnect);
    }

    #[test]
    fn skip_keeps_the_counter() {
        let mut schedule = PollSchedule::new(INTERVAL);
        schedule.begin();
        schedule.failure();
        schedule.begin();
        assert_eq!(schedule.skip(), Next::Reschedule(INTERVAL));
        assert_eq!(schedule.failures(), 1);
        assert!(!schedule.is_in_flight());
    }
}

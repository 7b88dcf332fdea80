//! Wall clock abstraction and the OTP resend countdown

use chrono::{DateTime, TimeDelta, Utc};
use fleetdesk_types::Deadline;
use parking_lot::Mutex;
use std::{fmt, sync::Arc, time::Duration};

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jump to an instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Resend countdown for an outstanding OTP
///
/// Holds no timer. Every read recomputes from the clock, so the value shown
/// once per second decrements by exactly one and resend eligibility flips only
/// when it reaches zero.
#[derive(Debug, Clone)]
pub struct Countdown {
    clock: Arc<dyn Clock>,
    deadline: Option<Deadline>,
}

impl Countdown {
    /// Idle countdown
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            deadline: None,
        }
    }

    /// Start (or restart) from a full window
    pub fn start(&mut self, window_secs: u64) {
        self.deadline = Some(Deadline::after(self.clock.now(), window_secs));
    }

    /// Follow an existing deadline
    pub const fn track(&mut self, deadline: Deadline) {
        self.deadline = Some(deadline);
    }

    /// Stop counting
    pub const fn reset(&mut self) {
        self.deadline = None;
    }

    /// Whether a countdown is active
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whole seconds left, zero when idle or finished
    #[must_use]
    pub fn seconds_remaining(&self) -> u64 {
        self.deadline
            .map_or(0, |deadline| deadline.seconds_remaining(self.clock.now()))
    }

    /// Whether a resend may be requested
    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.is_running() && self.seconds_remaining() == 0
    }

    /// Time until the next whole second boundary, for driving a display tick
    #[must_use]
    pub fn until_next_tick(&self) -> Option<Duration> {
        let deadline = self.deadline?;
        let remaining = deadline.remaining(self.clock.now());
        if remaining.is_zero() {
            return None;
        }
        let sub = remaining.subsec_nanos();
        Some(if sub == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_nanos(u64::from(sub))
        })
    }
}

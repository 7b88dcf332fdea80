//! OTP challenges and their expiry

use crate::{PhoneNumber, Role};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Absolute point in time after which something is no longer valid
///
/// Remaining time is always recomputed from a caller supplied `now`, so a
/// countdown derived from it cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    expires_at: DateTime<Utc>,
}

impl Deadline {
    /// Deadline `window_secs` seconds after `now`
    #[must_use]
    pub fn after(now: DateTime<Utc>, window_secs: u64) -> Self {
        let window = i64::try_from(window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            expires_at: now
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Deadline at a fixed instant
    #[must_use]
    pub const fn at(expires_at: DateTime<Utc>) -> Self {
        Self { expires_at }
    }

    /// When the deadline passes
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the deadline has passed at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left at `now`, zero once expired
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whole seconds left at `now`, rounded up
    ///
    /// Reads the full window at issue time and reaches zero exactly when the
    /// deadline passes.
    #[must_use]
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.expires_at - now).num_milliseconds().max(0);
        u64::try_from(millis).unwrap_or(0).div_ceil(1000)
    }
}

/// An outstanding OTP challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Number the code was sent to
    pub phone: PhoneNumber,

    /// Console the operator is signing in to
    pub role: Role,

    /// Backend handle for this challenge
    pub verification_id: String,

    /// When the challenge lapses and a resend becomes possible
    pub deadline: Deadline,

    /// Attempts left, when the backend reports it
    pub attempts_remaining: Option<u32>,

    /// Issued locally for an allowlisted test number
    pub bypass: bool,
}

impl Challenge {
    /// Seconds until the challenge expires
    #[must_use]
    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.deadline.seconds_remaining(now)
    }

    /// Whether the challenge can still be verified
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_expired(now)
    }

    /// Whether a new code may be requested
    #[must_use]
    pub fn can_resend(&self, now: DateTime<Utc>) -> bool {
        self.expires_in_seconds(now) == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_seconds_remaining_counts_down_by_whole_seconds() {
        let deadline = Deadline::after(t0(), 90);

        assert_eq!(deadline.seconds_remaining(t0()), 90);
        assert_eq!(
            deadline.seconds_remaining(t0() + TimeDelta::milliseconds(500)),
            90
        );
        assert_eq!(deadline.seconds_remaining(t0() + TimeDelta::seconds(1)), 89);
        assert_eq!(
            deadline.seconds_remaining(t0() + TimeDelta::milliseconds(89_001)),
            1
        );
        assert_eq!(deadline.seconds_remaining(t0() + TimeDelta::seconds(90)), 0);
        assert_eq!(deadline.seconds_remaining(t0() + TimeDelta::hours(1)), 0);
    }

    #[test]
    fn test_expiry_boundary() {
        let deadline = Deadline::after(t0(), 90);
        assert!(!deadline.is_expired(t0() + TimeDelta::milliseconds(89_999)));
        assert!(deadline.is_expired(t0() + TimeDelta::seconds(90)));
        assert_eq!(deadline.remaining(t0() + TimeDelta::seconds(100)), Duration::ZERO);
        assert_eq!(deadline.remaining(t0() + TimeDelta::seconds(30)), Duration::from_secs(60));
    }

    #[test]
    fn test_huge_window_saturates() {
        let deadline = Deadline::after(t0(), u64::MAX);
        assert!(!deadline.is_expired(t0()));
    }

    #[test]
    fn test_challenge_resend_only_at_zero() {
        let challenge = Challenge {
            phone: PhoneNumber::parse("8145328152").unwrap(),
            role: Role::Franchise,
            verification_id: "v-1".to_string(),
            deadline: Deadline::after(t0(), 90),
            attempts_remaining: None,
            bypass: false,
        };

        for second in 0..90 {
            assert!(!challenge.can_resend(t0() + TimeDelta::seconds(second)));
        }
        assert!(challenge.can_resend(t0() + TimeDelta::seconds(90)));
        assert!(challenge.is_expired(t0() + TimeDelta::seconds(90)));
    }
}

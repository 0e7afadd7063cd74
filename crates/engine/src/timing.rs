//! Deadline arithmetic. Pure functions of the clock and the auction policy.

use spa_types::{Duration, Timestamp};

use crate::error::AuctionError;

/// Opening window for an auction started at `now`: `(opened_at, closes_at,
/// hard_deadline)`.
pub fn opening_window(
    now: Timestamp,
    min_duration: Duration,
    max_duration: Duration,
) -> Result<(Timestamp, Timestamp, Timestamp), AuctionError> {
    let overflow = || AuctionError::InvalidConfig("auction window overflows the clock".into());
    let closes_at = now.checked_add(min_duration).ok_or_else(overflow)?;
    let hard_deadline = now.checked_add(max_duration).ok_or_else(overflow)?;
    Ok((now, closes_at, hard_deadline))
}

/// Anti-sniping rule.
///
/// Activity strictly inside the last `threshold` seconds before `closes_at`
/// pushes the deadline out by `extension_time`, never past `hard_deadline`.
/// Returns the new deadline, or `None` when the deadline stays put.
pub fn evaluate_extension(
    now: Timestamp,
    closes_at: Timestamp,
    threshold: Duration,
    extension_time: Duration,
    hard_deadline: Timestamp,
) -> Option<Timestamp> {
    if now >= closes_at || closes_at - now >= threshold {
        return None;
    }

    let extended = closes_at.saturating_add(extension_time).min(hard_deadline);
    (extended > closes_at).then_some(extended)
}

/// True once bidding is over.
pub fn deadline_passed(now: Timestamp, closes_at: Timestamp) -> bool {
    now >= closes_at
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;

    #[test]
    fn test_late_activity_extends() {
        assert_eq!(evaluate_extension(999, 1000, 60, 300, 10_000), Some(1300));
    }

    #[test]
    fn test_early_activity_does_not_extend() {
        assert_eq!(evaluate_extension(880, 1000, 60, 300, 10_000), None);
        // exactly `threshold` before close is outside the window
        assert_eq!(evaluate_extension(940, 1000, 60, 300, 10_000), None);
        assert_eq!(evaluate_extension(941, 1000, 60, 300, 10_000), Some(1300));
    }

    #[test]
    fn test_extension_clamped_to_hard_deadline() {
        assert_eq!(evaluate_extension(999, 1000, 60, 300, 1100), Some(1100));
        assert_eq!(evaluate_extension(1099, 1100, 60, 300, 1100), None);
    }

    #[test]
    fn test_no_extension_after_close() {
        assert_eq!(evaluate_extension(1000, 1000, 60, 300, 10_000), None);
        assert_eq!(evaluate_extension(1001, 1000, 60, 300, 10_000), None);
    }

    #[test]
    fn test_opening_window() {
        assert_eq!(
            opening_window(100, DAY, 7 * DAY).unwrap(),
            (100, 100 + DAY, 100 + 7 * DAY)
        );
        assert!(opening_window(u64::MAX, 1, 1).is_err());
    }

    #[test]
    fn test_deadline_passed() {
        assert!(!deadline_passed(999, 1000));
        assert!(deadline_passed(1000, 1000));
    }
}

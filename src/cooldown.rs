use std::time::Duration;

use crate::scheduler::WindowSummary;

/// Failure ratio above which the next inter-batch delay is extended to let
/// provider-side quota recover.
pub const FAILURE_RATIO_THRESHOLD: f64 = 0.90;

/// Delay applied in place of the configured base delay after a
/// mostly-failed window.
pub const EXTENDED_COOLDOWN: Duration = Duration::from_secs(60);

/// Compute the delay to apply before the next window.
///
/// Pure function of the previous window only; a single healthy window
/// returns pacing to `base_delay` immediately.
pub fn next_delay(previous: &WindowSummary, base_delay: Duration) -> Duration {
    if previous.failure_ratio() > FAILURE_RATIO_THRESHOLD {
        EXTENDED_COOLDOWN
    } else {
        base_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(successes: usize, failures: usize) -> WindowSummary {
        WindowSummary {
            window_index: 0,
            successes,
            failures,
            deferred: 0,
        }
    }

    #[test]
    fn high_failure_ratio_extends_cooldown() {
        // 19 of 20 terminal outcomes failed: ratio 0.95.
        let delay = next_delay(&summary(1, 19), Duration::from_secs(5));
        assert_eq!(delay, EXTENDED_COOLDOWN);
    }

    #[test]
    fn moderate_failure_ratio_keeps_base_delay() {
        // Ratio 0.40.
        let base = Duration::from_secs(5);
        assert_eq!(next_delay(&summary(12, 8), base), base);
    }

    #[test]
    fn threshold_is_exclusive() {
        // Exactly 0.90 does not trigger the extended cooldown.
        let base = Duration::from_secs(7);
        assert_eq!(next_delay(&summary(2, 18), base), base);
    }

    #[test]
    fn total_failure_extends_cooldown() {
        assert_eq!(
            next_delay(&summary(0, 3), Duration::from_secs(1)),
            EXTENDED_COOLDOWN
        );
    }

    #[test]
    fn empty_window_keeps_base_delay() {
        // No terminal outcomes: ratio is defined as 0.
        let base = Duration::from_secs(2);
        assert_eq!(next_delay(&summary(0, 0), base), base);
    }
}

//! The retry backoff schedule, factored out as a pure function so it can be
//! tested without spinning up any I/O (per the design guidance: "Retry loop
//! is a pure function of `(attempt, maxRetries)` → delay ms").

use crate::duration::DurationMs;

/// Delay before the next attempt, or `None` if the budget is exhausted.
///
/// `attempt` is 0-based (the delay before the *first* retry, i.e. after the
/// initial attempt failed, is `retry_delay(0, max_retries)`). Backoff is
/// `1000 * 2^attempt` milliseconds, matching the Hook Lifecycle Engine's
/// `Invoke` retry policy.
pub fn retry_delay(attempt: u32, max_retries: u32) -> Option<DurationMs> {
    if attempt >= max_retries {
        return None;
    }
    let millis = 1000u64.saturating_mul(1u64 << attempt.min(32));
    Some(DurationMs::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retries_means_no_delay() {
        assert_eq!(retry_delay(0, 0), None);
    }

    #[test]
    fn delay_doubles_each_attempt() {
        assert_eq!(retry_delay(0, 3).unwrap().as_millis(), 1000);
        assert_eq!(retry_delay(1, 3).unwrap().as_millis(), 2000);
        assert_eq!(retry_delay(2, 3).unwrap().as_millis(), 4000);
    }

    #[test]
    fn exhausted_once_attempt_reaches_max() {
        assert_eq!(retry_delay(3, 3), None);
        assert_eq!(retry_delay(10, 3), None);
    }
}

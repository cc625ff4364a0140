//! Client-side retry pacing: exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// How a client spaces out repeated attempts of the same request.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based). Attempt 0 is immediate.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(attempt - 1);
        let capped = self.base.saturating_mul(factor).min(self.max);

        // Up to 10% jitter so synchronized clients spread out.
        let jitter_ms = (capped.as_millis() / 10) as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..jitter_ms)
        } else {
            0
        };

        capped + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_then_caps() {
        let backoff = Backoff {
            base: Duration::from_millis(100),
            max: Duration::from_millis(1000),
        };
        assert_eq!(backoff.delay(0), Duration::ZERO);

        let first = backoff.delay(1);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(110));

        let second = backoff.delay(2);
        assert!(second >= Duration::from_millis(200) && second < Duration::from_millis(220));

        let capped = backoff.delay(40);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }
}

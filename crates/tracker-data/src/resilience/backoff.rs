//! Decorrelated jitter 지수 백오프.
//!
//! `delay(n) = min(max_delay, random(base, delay(n-1) * 3))`, `delay(0) = base`

use std::time::Duration;

use rand::Rng;

/// 재시도 간 대기 시간 생성기.
#[derive(Debug, Clone)]
pub struct DecorrelatedJitter {
    base_ms: u64,
    max_ms: u64,
    previous_ms: u64,
}

impl DecorrelatedJitter {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base_ms = (base.as_millis() as u64).max(1);
        let max_ms = (max.as_millis() as u64).max(base_ms);
        Self {
            base_ms,
            max_ms,
            previous_ms: base_ms,
        }
    }

    /// 다음 대기 시간.
    pub fn next_delay(&mut self) -> Duration {
        let upper = self.previous_ms.saturating_mul(3).max(self.base_ms);
        let sampled = rand::thread_rng().gen_range(self.base_ms..=upper);
        let delay = sampled.min(self.max_ms);
        self.previous_ms = delay;
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_stay_within_bounds() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        let mut backoff = DecorrelatedJitter::new(base, max);

        for _ in 0..100 {
            let delay = backoff.next_delay();
            assert!(delay >= base, "delay {:?} below base", delay);
            assert!(delay <= max, "delay {:?} above cap", delay);
        }
    }

    #[test]
    fn test_max_below_base_is_clamped_to_base() {
        let mut backoff = DecorrelatedJitter::new(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}

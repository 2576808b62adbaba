use std::time::Duration;

/// Exponential backoff with a hard attempt budget.
///
/// The delay doubles per attempt from `base` and stops growing after four
/// doublings.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempt: 0,
        }
    }

    pub fn next(&mut self) -> Duration {
        self.attempt += 1;
        self.base * 2u32.pow((self.attempt - 1).min(4))
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_then_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), 10);
        let delays: Vec<u64> = (0..7).map(|_| backoff.next().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 1600, 1600]);
    }

    #[test]
    fn test_exhaustion_and_reset() {
        let mut backoff = Backoff::new(Duration::from_millis(5), 2);
        assert!(!backoff.is_exhausted());
        backoff.next();
        backoff.next();
        assert!(backoff.is_exhausted());
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert!(!backoff.is_exhausted());
    }
}

//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff mechanism for polling.
//! The delay grows more slowly than exponential backoff, which suits waiting
//! on an asynchronous validation that usually finishes within seconds.
//!
//! Calculations are done in milliseconds.
//! With 500ms/10s bounds the sequence is: 0.5s, 0.5s, 1s, 1.5s, 2.5s, 4s, 6.5s, 10s (max).
//!
//! ## Usage
//!
//! ```rust
//! use encrypted_ssm::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(Duration::from_millis(500), Duration::from_secs(10));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(500));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(500));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(1000));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(1500));
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at the maximum.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff in milliseconds
    prev_millis: u64,
    /// Current backoff in milliseconds
    current_millis: u64,
    /// Maximum backoff in milliseconds
    max_millis: u64,
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given bounds
    ///
    /// A `max` below `min` is raised to `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_millis = as_millis(min);
        Self {
            prev_millis: 0,
            current_millis: min_millis,
            max_millis: as_millis(max).max(min_millis),
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_millis;

        let next_millis = self.prev_millis.saturating_add(self.current_millis);
        self.prev_millis = self.current_millis;
        self.current_millis = std::cmp::min(next_millis, self.max_millis);

        Duration::from_millis(result)
    }
}

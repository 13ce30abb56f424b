//! Rate limiting for WebSocket client messages.
//!
//! Each connection gets a [`MessageRateLimiter`] combining a short burst
//! window with a longer sustained window. A message is accepted only if both
//! windows have room; rejected messages do not consume capacity.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window counter
#[derive(Debug)]
pub struct SlidingWindow {
    /// Timestamps of accepted messages still inside the window
    timestamps: VecDeque<Instant>,
    /// Maximum number of messages allowed in the window
    max_requests: usize,
    /// Window length
    window: Duration,
}

impl SlidingWindow {
    /// Create a new sliding window
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Maximum number of messages allowed in the window
    /// * `window` - Window length
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(max_requests),
            max_requests,
            window,
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(ts) = self.timestamps.front() {
            if now.duration_since(*ts) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn has_room(&mut self, now: Instant) -> bool {
        self.expire(now);
        self.timestamps.len() < self.max_requests
    }

    fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    /// Number of messages left in the current window
    pub fn remaining(&self) -> usize {
        self.max_requests.saturating_sub(self.timestamps.len())
    }

    /// Time until the oldest message leaves the window
    pub fn retry_after(&self, now: Instant) -> Duration {
        self.timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default()
    }
}

/// Which window rejected a message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitExceeded {
    Burst { retry_after: Duration },
    Sustained { retry_after: Duration },
}

impl LimitExceeded {
    /// Label used in logs and metrics
    pub fn window(&self) -> &'static str {
        match self {
            Self::Burst { .. } => "burst",
            Self::Sustained { .. } => "sustained",
        }
    }

    /// Message sent back to the client
    pub fn client_message(&self) -> String {
        match self {
            Self::Burst { .. } => "Rate limit exceeded. Please slow down.".to_string(),
            Self::Sustained { retry_after } => format!(
                "Too many messages. Please wait {}s before sending more.",
                retry_after.as_secs().max(1)
            ),
        }
    }
}

/// Per-connection limiter with burst and sustained windows
#[derive(Debug)]
pub struct MessageRateLimiter {
    burst: SlidingWindow,
    sustained: SlidingWindow,
}

impl MessageRateLimiter {
    pub fn new(burst: SlidingWindow, sustained: SlidingWindow) -> Self {
        Self { burst, sustained }
    }

    /// Check a message at the current instant
    ///
    /// # Example
    ///
    /// ```
    /// use mafia_server::api::rate_limiter::{MessageRateLimiter, SlidingWindow};
    /// use std::time::Duration;
    ///
    /// let mut limiter = MessageRateLimiter::new(
    ///     SlidingWindow::new(2, Duration::from_secs(1)),
    ///     SlidingWindow::new(100, Duration::from_secs(60)),
    /// );
    /// assert!(limiter.check().is_ok());
    /// assert!(limiter.check().is_ok());
    /// assert!(limiter.check().is_err());
    /// ```
    pub fn check(&mut self) -> Result<(), LimitExceeded> {
        self.check_at(Instant::now())
    }

    pub fn check_at(&mut self, now: Instant) -> Result<(), LimitExceeded> {
        if !self.burst.has_room(now) {
            return Err(LimitExceeded::Burst {
                retry_after: self.burst.retry_after(now),
            });
        }
        if !self.sustained.has_room(now) {
            return Err(LimitExceeded::Sustained {
                retry_after: self.sustained.retry_after(now),
            });
        }

        self.burst.record(now);
        self.sustained.record(now);
        Ok(())
    }

    /// Messages left before the tighter of the two windows fills up
    pub fn remaining(&self) -> usize {
        self.burst.remaining().min(self.sustained.remaining())
    }
}

impl Default for MessageRateLimiter {
    /// 10 messages per second, 100 messages per minute
    fn default() -> Self {
        Self::new(
            SlidingWindow::new(10, Duration::from_secs(1)),
            SlidingWindow::new(100, Duration::from_secs(60)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(burst: usize, sustained: usize) -> MessageRateLimiter {
        MessageRateLimiter::new(
            SlidingWindow::new(burst, Duration::from_secs(1)),
            SlidingWindow::new(sustained, Duration::from_secs(60)),
        )
    }

    #[test]
    fn test_allows_within_limit() {
        let mut limiter = limiter(5, 100);
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at(now).is_ok());
        }
        assert_eq!(limiter.remaining(), 0);
    }

    #[test]
    fn test_burst_blocks_then_recovers() {
        let mut limiter = limiter(3, 100);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.check_at(start).unwrap();
        }
        let err = limiter.check_at(start).unwrap_err();
        assert_eq!(err.window(), "burst");

        let later = start + Duration::from_millis(1100);
        assert!(limiter.check_at(later).is_ok(), "Should allow after window expires");
    }

    #[test]
    fn test_sustained_blocks_across_bursts() {
        let mut limiter = limiter(10, 15);
        let start = Instant::now();

        for _ in 0..10 {
            limiter.check_at(start).unwrap();
        }
        let next = start + Duration::from_secs(2);
        for _ in 0..5 {
            limiter.check_at(next).unwrap();
        }

        let err = limiter.check_at(next).unwrap_err();
        assert!(matches!(err, LimitExceeded::Sustained { .. }));
        assert!(err.client_message().contains("wait"));
    }

    #[test]
    fn test_rejected_messages_do_not_count() {
        let mut limiter = limiter(1, 2);
        let start = Instant::now();

        limiter.check_at(start).unwrap();
        for _ in 0..20 {
            assert!(limiter.check_at(start).is_err());
        }

        // Only the accepted message is in the sustained window.
        let later = start + Duration::from_secs(2);
        assert!(limiter.check_at(later).is_ok());
    }

    #[test]
    fn test_retry_after_is_bounded_by_window() {
        let mut window = SlidingWindow::new(1, Duration::from_secs(1));
        let now = Instant::now();
        assert_eq!(window.retry_after(now), Duration::ZERO);

        window.record(now);
        assert!(window.retry_after(now) <= Duration::from_secs(1));
    }

    #[test]
    fn test_default_limits() {
        let mut limiter = MessageRateLimiter::default();
        let now = Instant::now();

        for _ in 0..10 {
            assert!(limiter.check_at(now).is_ok());
        }
        assert!(limiter.check_at(now).is_err(), "Burst limiter should block 11th message");
    }
}

use crate::traits::observer::CloseNotification;
use std::time::Duration;

/// Trait for defining reconnection strategies
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Reconnection attempts made since the session was last open (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Do not reconnect
    fn next_delay(&self, attempt: usize) -> Option<Duration>;
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between attempts. A zero delay
/// disables reconnection.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if self.delay.is_zero() {
            return None;
        }
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        Some(self.delay)
    }
}

/// Never reconnect strategy
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }
}

/// Strategy matching a configured reconnect interval
pub fn strategy_for_interval(interval: Duration) -> Box<dyn ReconnectionStrategy> {
    if interval.is_zero() {
        Box::new(NeverReconnect)
    } else {
        Box::new(FixedDelay::new(interval, None))
    }
}

/// Facts about a closing session that decide whether it is re-established
#[derive(Debug, Clone, Copy)]
pub struct ReconnectContext {
    /// Raw close reason
    pub reason: CloseNotification,
    /// A handshake has succeeded since the last explicit connect
    pub ever_opened: bool,
    /// A transport was established since the last explicit connect
    pub was_connected: bool,
    /// Reconnection attempts since the session was last open
    pub attempt: usize,
}

impl ReconnectContext {
    /// Delay before reconnecting, or `None` when the session is not eligible
    pub fn delay(&self, strategy: &dyn ReconnectionStrategy) -> Option<Duration> {
        if !self.reason.is_connectivity_failure() {
            return None;
        }
        if !self.ever_opened || !self.was_connected {
            return None;
        }
        strategy.next_delay(self.attempt)
    }
}

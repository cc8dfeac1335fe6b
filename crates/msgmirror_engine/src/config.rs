//! Configuration for the sync engine.

use rand::Rng;
use std::time::Duration;
use url::Url;

/// Delay between a disconnect and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Shortest delay any policy will produce.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// WebSocket endpoint of the feed.
    pub endpoint: Url,
    /// Reconnect scheduling.
    pub reconnect: ReconnectPolicy,
    /// Upper bound on a single connection attempt. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl EngineConfig {
    /// Creates a new engine configuration.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: None,
        }
    }

    /// Sets the reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Sets the connection attempt timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Configuration for reconnect delays.
///
/// The default is a fixed interval: every attempt waits
/// [`DEFAULT_RECONNECT_DELAY`] and attempts never stop. Delays are never
/// shorter than [`MIN_RECONNECT_DELAY`], whatever the fields say.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failed attempt.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl ReconnectPolicy {
    /// Creates a fixed-interval policy.
    pub fn fixed(delay: Duration) -> Self {
        let delay = delay.max(MIN_RECONNECT_DELAY);
        Self {
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Creates an exponential policy doubling from `initial` up to `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(MIN_RECONNECT_DELAY);
        Self {
            initial_delay: initial,
            max_delay: max.max(initial),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the backoff multiplier. Values below 1.0 (or not finite) act
    /// as 1.0.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = sane_multiplier(multiplier);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay before reconnect attempt `attempt` (1-indexed,
    /// counting consecutive failures since the last successful open).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Fields are public, so re-check the bounds the constructors enforce.
        let initial = self.initial_delay.max(MIN_RECONNECT_DELAY);
        let max = self.max_delay.max(initial);

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay =
            initial.as_secs_f64() * sane_multiplier(self.backoff_multiplier).powi(exponent);

        let mut delay_secs = base_delay.min(max.as_secs_f64());
        if self.add_jitter {
            // Add up to 25% jitter
            delay_secs += delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
        }
        Duration::try_from_secs_f64(delay_secs).unwrap_or(max)
    }
}

fn sane_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() {
        multiplier.max(1.0)
    } else {
        1.0
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_builder() {
        let endpoint = Url::parse("ws://localhost:8080/ws").unwrap();
        let config = EngineConfig::new(endpoint.clone())
            .with_reconnect(ReconnectPolicy::fixed(Duration::from_secs(1)))
            .with_connect_timeout(Duration::from_secs(10));

        assert_eq!(config.endpoint, endpoint);
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn default_is_fixed_five_seconds() {
        let config = EngineConfig::new(Url::parse("ws://localhost/ws").unwrap());
        assert_eq!(config.connect_timeout, None);

        let policy = config.reconnect;
        for attempt in [1, 2, 10, 1000] {
            assert_eq!(policy.delay_for_attempt(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn exponential_delay_calculation() {
        let policy = ReconnectPolicy::exponential(Duration::from_millis(100), Duration::from_secs(30))
            .with_jitter(false);

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_respects_max() {
        let policy = ReconnectPolicy::exponential(Duration::from_secs(1), Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        // Even with high multiplier, should not exceed max
        let delay = policy.delay_for_attempt(5);
        assert!(delay >= Duration::from_secs(5));
        assert!(delay <= Duration::from_millis(6250)); // 5s + 25% jitter
    }

    #[test]
    fn zero_delay_is_floored() {
        let policy = ReconnectPolicy::fixed(Duration::ZERO);
        assert_eq!(policy.initial_delay, MIN_RECONNECT_DELAY);
        assert_eq!(policy.delay_for_attempt(1), MIN_RECONNECT_DELAY);

        let policy = ReconnectPolicy::exponential(Duration::ZERO, Duration::ZERO).with_jitter(false);
        assert_eq!(policy.delay_for_attempt(3), MIN_RECONNECT_DELAY);

        // Hand-built policies get the same floor.
        let policy = ReconnectPolicy {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        };
        assert_eq!(policy.delay_for_attempt(1), MIN_RECONNECT_DELAY);
    }

    #[test]
    fn negative_multiplier_acts_as_fixed() {
        let policy = ReconnectPolicy::fixed(Duration::from_secs(1)).with_backoff_multiplier(-2.0);
        assert_eq!(policy.backoff_multiplier, 1.0);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));

        let policy = ReconnectPolicy {
            backoff_multiplier: f64::NAN,
            ..ReconnectPolicy::fixed(Duration::from_secs(1))
        };
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(1));
    }

    #[test]
    fn overflowing_delay_falls_back_to_max() {
        let policy = ReconnectPolicy::exponential(Duration::from_secs(1), Duration::MAX)
            .with_backoff_multiplier(1e300);
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::MAX);

        let jittered = ReconnectPolicy::exponential(Duration::from_secs(1), Duration::MAX);
        assert_eq!(jittered.delay_for_attempt(u32::MAX), Duration::MAX);
    }
}

//! Connection state, reconnect policy and the events a manager emits.

use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Connection state of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been requested yet.
    Idle,
    /// Socket opening or STOMP handshake in flight.
    Connecting,
    Connected,
    /// Socket gone; a reconnect may be scheduled.
    Disconnected,
    /// No automatic reconnection will happen until `connect()` is called again.
    Terminated(TerminationReason),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, ConnectionState::Terminated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The server rejected the credentials.
    AuthenticationFailed,
    /// `max_attempts` reconnects failed in a row.
    RetriesExhausted,
}

/// Observable changes, delivered to every receiver from `ConnectionManager::events()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The session owner must invalidate the session (force logout).
    AuthenticationFailed { reason: String },
}

/// Result of a `connect()` call that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new socket is being opened.
    Started,
    /// Already connecting or connected; nothing done.
    AlreadyActive,
    /// Called again too soon after the previous attempt; nothing done.
    Debounced,
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnect attempts (0 = never reconnect)
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Share of the delay that is randomized, 0.0..=1.0
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.3,
        }
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "initial reconnect delay must be > 0".to_string(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::Invalid(
                "max reconnect delay must be >= initial delay".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff multiplier must be >= 1.0".to_string(),
            ));
        }
        if !self.jitter.is_finite() || !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(
                "jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Exponential delay before attempt number `attempt` (0-based), without jitter.
    ///
    /// Out-of-range settings are clamped rather than trusted: a multiplier
    /// below 1 (or NaN) counts as 1.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let multiplier = if self.backoff_multiplier.is_finite() {
            self.backoff_multiplier.max(1.0)
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (initial * multiplier.powi(exponent)).min(max);
        Duration::try_from_secs_f64(delay).unwrap_or(self.max_delay)
    }

    /// Delay for a given attempt with jitter applied.
    ///
    /// The `jitter` share of the base delay is replaced by a uniform draw
    /// from `0..=base`, so clients that lost the server together spread out.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let base_secs = base.as_secs_f64();
        if jitter == 0.0 || base_secs == 0.0 {
            return base;
        }

        let randomized = rand::thread_rng().gen_range(0.0..=base_secs);
        Duration::try_from_secs_f64(base_secs * (1.0 - jitter) + randomized * jitter).unwrap_or(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> ReconnectConfig {
        ReconnectConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let config = no_jitter();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = ReconnectConfig {
            jitter: 0.5,
            ..Default::default()
        };
        for _ in 0..200 {
            let delay = config.delay_for_attempt(2);
            assert!(delay >= Duration::from_secs(2), "{:?}", delay);
            assert!(delay <= Duration::from_secs(4), "{:?}", delay);
        }
    }

    #[test]
    fn out_of_range_settings_are_clamped() {
        let wild = ReconnectConfig {
            jitter: 3.0,
            ..Default::default()
        };
        for _ in 0..50 {
            assert!(wild.delay_for_attempt(0) <= Duration::from_secs(1));
        }

        let nan = ReconnectConfig {
            jitter: f64::NAN,
            backoff_multiplier: f64::NAN,
            ..Default::default()
        };
        assert_eq!(nan.delay_for_attempt(5), Duration::from_secs(1));

        let shrinking = ReconnectConfig {
            jitter: 0.0,
            backoff_multiplier: 0.1,
            ..Default::default()
        };
        assert_eq!(shrinking.delay_for_attempt(4), Duration::from_secs(1));
    }

    #[test]
    fn validation_rejects_nonsense() {
        assert!(ReconnectConfig::default().validate().is_ok());
        assert!(ReconnectConfig {
            jitter: 1.5,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(ReconnectConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(ReconnectConfig {
            max_delay: Duration::from_millis(10),
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Terminated(TerminationReason::RetriesExhausted).is_terminated());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}

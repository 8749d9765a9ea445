use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors raised when a poll policy is constructed with invalid settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    #[error("poll timeout must be greater than zero")]
    ZeroTimeout,
    #[error("backoff multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),
    #[error("backoff max interval {max_interval:?} is shorter than the base interval {interval:?}")]
    MaxIntervalTooShort {
        interval: Duration,
        max_interval: Duration,
    },
}

/// How the wait between attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Backoff {
    /// Always wait the base interval.
    #[default]
    Fixed,
    /// Multiply the wait after every retryable failure, capped at `max_interval`.
    Exponential {
        multiplier: f64,
        max_interval: Duration,
    },
}

/// Deadline and pacing of a poll.
///
/// Only constructible through validating constructors, so the poll loop never
/// sees a zero interval or a zero timeout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawPollPolicy")]
pub struct PollPolicy {
    timeout: Duration,
    interval: Duration,
    backoff: Backoff,
}

impl PollPolicy {
    /// Create a fixed-interval policy.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::ZeroInterval`] if `interval` is zero
    /// - [`PolicyError::ZeroTimeout`] if `timeout` is zero
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self, PolicyError> {
        if interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        if timeout.is_zero() {
            return Err(PolicyError::ZeroTimeout);
        }
        if timeout <= interval {
            debug!(
                timeout_ms = timeout.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "poll timeout does not exceed the interval, only one attempt will be made"
            );
        }
        Ok(Self {
            timeout,
            interval,
            backoff: Backoff::Fixed,
        })
    }

    /// Replace the backoff strategy.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::InvalidMultiplier`] if the multiplier is not finite or below 1.0
    /// - [`PolicyError::MaxIntervalTooShort`] if the cap is below the base interval
    pub fn with_backoff(mut self, backoff: Backoff) -> Result<Self, PolicyError> {
        if let Backoff::Exponential {
            multiplier,
            max_interval,
        } = backoff
        {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(PolicyError::InvalidMultiplier(multiplier));
            }
            if max_interval < self.interval {
                return Err(PolicyError::MaxIntervalTooShort {
                    interval: self.interval,
                    max_interval,
                });
            }
        }
        self.backoff = backoff;
        Ok(self)
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// The wait that follows a wait of `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                multiplier,
                max_interval,
            } => Duration::try_from_secs_f64(current.as_secs_f64() * multiplier)
                .map_or(max_interval, |next| next.min(max_interval)),
        }
    }
}

/// Configuration-file shape of a [`PollPolicy`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPollPolicy {
    timeout_secs: u64,
    interval_secs: u64,
    #[serde(default)]
    backoff_multiplier: Option<f64>,
    #[serde(default)]
    max_interval_secs: Option<u64>,
}

impl TryFrom<RawPollPolicy> for PollPolicy {
    type Error = PolicyError;

    fn try_from(raw: RawPollPolicy) -> Result<Self, Self::Error> {
        let policy = PollPolicy::new(
            Duration::from_secs(raw.timeout_secs),
            Duration::from_secs(raw.interval_secs),
        )?;
        match raw.backoff_multiplier {
            Some(multiplier) => {
                let max_interval = raw
                    .max_interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(policy.timeout);
                policy.with_backoff(Backoff::Exponential {
                    multiplier,
                    max_interval,
                })
            }
            None => Ok(policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn rejects_zero_durations() {
        assert_eq!(
            PollPolicy::new(Duration::from_secs(1), Duration::ZERO),
            Err(PolicyError::ZeroInterval)
        );
        assert_eq!(
            PollPolicy::new(Duration::ZERO, Duration::from_secs(1)),
            Err(PolicyError::ZeroTimeout)
        );
    }

    #[test]
    fn accepts_timeout_shorter_than_interval() {
        let policy = PollPolicy::new(Duration::from_secs(1), Duration::from_secs(5))
            .expect("degenerate policy is still valid");
        assert_eq!(policy.timeout(), Duration::from_secs(1));
        assert_eq!(policy.interval(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_backoff() {
        let policy = PollPolicy::new(Duration::from_secs(60), Duration::from_secs(2))
            .expect("valid policy");

        assert_eq!(
            policy.clone().with_backoff(Backoff::Exponential {
                multiplier: 0.5,
                max_interval: Duration::from_secs(10),
            }),
            Err(PolicyError::InvalidMultiplier(0.5))
        );
        assert!(matches!(
            policy.clone().with_backoff(Backoff::Exponential {
                multiplier: f64::NAN,
                max_interval: Duration::from_secs(10),
            }),
            Err(PolicyError::InvalidMultiplier(_))
        ));
        assert_eq!(
            policy.with_backoff(Backoff::Exponential {
                multiplier: 2.0,
                max_interval: Duration::from_secs(1),
            }),
            Err(PolicyError::MaxIntervalTooShort {
                interval: Duration::from_secs(2),
                max_interval: Duration::from_secs(1),
            })
        );
    }

    #[test]
    fn exponential_interval_is_capped() {
        let policy = PollPolicy::new(Duration::from_secs(60), Duration::from_secs(1))
            .and_then(|p| {
                p.with_backoff(Backoff::Exponential {
                    multiplier: 2.0,
                    max_interval: Duration::from_secs(5),
                })
            })
            .expect("valid policy");

        let mut wait = policy.interval();
        let mut waits = Vec::new();
        for _ in 0..5 {
            waits.push(wait.as_secs());
            wait = policy.next_interval(wait);
        }
        assert_eq!(waits, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn exponential_interval_saturates_at_huge_cap() {
        let policy = PollPolicy::new(Duration::MAX, Duration::from_secs(1))
            .and_then(|p| {
                p.with_backoff(Backoff::Exponential {
                    multiplier: 1e30,
                    max_interval: Duration::MAX,
                })
            })
            .expect("valid policy");
        assert_eq!(policy.next_interval(Duration::from_secs(1)), Duration::MAX);

        let policy: PollPolicy = serde_yaml::from_str(
            "timeoutSecs: 18446744073709551615\nintervalSecs: 1\nbackoffMultiplier: 2.0\n",
        )
        .expect("valid backoff yaml");
        let mut wait = policy.interval();
        for _ in 0..80 {
            wait = policy.next_interval(wait);
        }
        assert_eq!(wait, policy.timeout());
    }

    #[test]
    fn fixed_interval_never_changes() {
        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_millis(250))
            .expect("valid policy");
        assert_eq!(
            policy.next_interval(Duration::from_secs(3)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn deserializes_and_validates() {
        let policy: PollPolicy = serde_yaml::from_str("timeoutSecs: 300\nintervalSecs: 5\n")
            .expect("valid policy yaml");
        assert_eq!(policy.timeout(), Duration::from_secs(300));
        assert_eq!(policy.backoff(), Backoff::Fixed);

        let policy: PollPolicy = serde_yaml::from_str(
            "timeoutSecs: 300\nintervalSecs: 5\nbackoffMultiplier: 1.5\nmaxIntervalSecs: 30\n",
        )
        .expect("valid backoff yaml");
        assert_eq!(
            policy.backoff(),
            Backoff::Exponential {
                multiplier: 1.5,
                max_interval: Duration::from_secs(30),
            }
        );

        let err = serde_yaml::from_str::<PollPolicy>("timeoutSecs: 300\nintervalSecs: 0\n")
            .expect_err("zero interval must be rejected");
        assert!(err.to_string().contains("interval must be greater than zero"));
    }
}

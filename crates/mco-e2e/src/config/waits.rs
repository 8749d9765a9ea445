use std::time::Duration;

use converge::PolicyError;
use converge::PollPolicy;

use crate::config::cli::SuiteArgs;

/// How long one scenario step may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// One timeout unit, polled every second.
    Default,
    /// `n` timeout units, polled at the configured interval.
    Minutes(u32),
}

/// Timeout unit and poll interval shared by all scenario steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waits {
    unit: Duration,
    interval: Duration,
    default_interval: Duration,
}

impl Default for Waits {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(60),
            interval: Duration::from_secs(5),
            default_interval: Duration::from_secs(1),
        }
    }
}

impl Waits {
    pub fn new(unit: Duration, interval: Duration) -> Self {
        Self {
            unit,
            interval,
            default_interval: interval.min(Duration::from_secs(1)),
        }
    }

    /// # Errors
    ///
    /// - [`PolicyError`] if the unit or interval is zero
    pub fn policy(&self, wait: Wait) -> Result<PollPolicy, PolicyError> {
        match wait {
            Wait::Default => PollPolicy::new(self.unit, self.default_interval),
            Wait::Minutes(n) => PollPolicy::new(self.unit.saturating_mul(n), self.interval),
        }
    }
}

impl From<&SuiteArgs> for Waits {
    fn from(args: &SuiteArgs) -> Self {
        Self::new(
            Duration::from_secs(args.timeout_unit_secs),
            Duration::from_secs(args.poll_interval_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn minutes_scale_the_unit() {
        let waits = Waits::default();
        let policy = waits.policy(Wait::Minutes(25)).expect("valid policy");
        assert_eq!(policy.timeout(), Duration::from_secs(25 * 60));
        assert_eq!(policy.interval(), Duration::from_secs(5));

        let policy = waits.policy(Wait::Default).expect("valid policy");
        assert_eq!(policy.timeout(), Duration::from_secs(60));
        assert_eq!(policy.interval(), Duration::from_secs(1));
    }

    #[test]
    fn short_interval_shortens_default_interval() {
        let waits = Waits::new(Duration::from_secs(2), Duration::from_millis(100));
        let policy = waits.policy(Wait::Default).expect("valid policy");
        assert_eq!(policy.interval(), Duration::from_millis(100));
    }

    #[test]
    fn zero_interval_is_a_configuration_error() {
        let waits = Waits::new(Duration::from_secs(60), Duration::ZERO);
        assert_eq!(
            waits.policy(Wait::Minutes(5)),
            Err(PolicyError::ZeroInterval)
        );
    }
}

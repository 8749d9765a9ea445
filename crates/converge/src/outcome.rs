use std::fmt;

use thiserror::Error;

/// Reason reported when a poll is stopped through its cancellation token.
pub const CANCELED_REASON: &str = "canceled";

/// Terminal result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The probe reported success.
    Converged,
    /// The deadline passed while the probe kept reporting retryable failures.
    TimedOut { last_reason: String },
    /// The probe reported a fatal failure, or the poll was cancelled.
    Aborted { reason: String },
}

impl Outcome {
    pub const fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Converts into a `Result`; anything but `Converged` is an error.
    pub fn into_result(self) -> Result<(), PollError> {
        match self {
            Self::Converged => Ok(()),
            Self::TimedOut { last_reason } => Err(PollError::TimedOut { last_reason }),
            Self::Aborted { reason } => Err(PollError::Aborted { reason }),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::TimedOut { .. } => "timed_out",
            Self::Aborted { .. } => "aborted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::TimedOut { last_reason } => write!(f, "timed out: {last_reason}"),
            Self::Aborted { reason } => write!(f, "aborted: {reason}"),
        }
    }
}

/// A poll that did not converge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("timed out waiting for convergence, last observation: {last_reason}")]
    TimedOut { last_reason: String },
    #[error("aborted: {reason}")]
    Aborted { reason: String },
}

impl PollError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Aborted { reason } if reason == CANCELED_REASON)
    }
}

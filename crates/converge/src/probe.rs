use std::fmt::Display;

/// Result of a single observation against an external system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The observed state is the one being waited for.
    Success,
    /// Not there yet; the condition may still become true with more time.
    Retryable(String),
    /// Retrying cannot change the answer.
    Fatal(String),
}

impl ProbeResult {
    pub fn retryable(reason: impl Display) -> Self {
        Self::Retryable(reason.to_string())
    }

    pub fn fatal(reason: impl Display) -> Self {
        Self::Fatal(reason.to_string())
    }

    /// `Success` when `holds`, otherwise a retryable failure carrying `reason`.
    pub fn from_check(holds: bool, reason: impl Display) -> Self {
        if holds {
            Self::Success
        } else {
            Self::retryable(reason)
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Keep going with `next` only if this result is a success.
    ///
    /// Used to chain several checks where the first failure wins.
    pub fn and_then(self, next: impl FnOnce() -> ProbeResult) -> ProbeResult {
        match self {
            Self::Success => next(),
            failure => failure,
        }
    }
}

/// One observation attempt. Implemented for every `FnMut() -> ProbeResult`.
pub trait Probe {
    fn probe(&mut self) -> ProbeResult;
}

impl<F> Probe for F
where
    F: FnMut() -> ProbeResult,
{
    fn probe(&mut self) -> ProbeResult {
        self()
    }
}

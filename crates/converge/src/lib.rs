//! Bounded polling for eventually-consistent backends.
//!
//! A [`Probe`] performs one observation of an external system and classifies
//! what it saw as success, a retryable failure or a fatal failure. The
//! [`Poller`] repeats the probe on a fixed (or backed-off) interval until it
//! succeeds, fails fatally, gets cancelled or runs out of time, and reports a
//! single terminal [`Outcome`].
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use converge::{poll, Outcome, PollPolicy, ProbeResult};
//!
//! let policy = PollPolicy::new(Duration::from_millis(50), Duration::from_millis(10))?;
//! let mut seen = 0;
//! let outcome = poll(
//!     || {
//!         seen += 1;
//!         ProbeResult::from_check(seen >= 2, "not ready yet")
//!     },
//!     &policy,
//! );
//! assert_eq!(outcome, Outcome::Converged);
//! # Ok::<(), converge::PolicyError>(())
//! ```

pub mod clock;
pub mod outcome;
pub mod policy;
pub mod poller;
pub mod probe;

pub use clock::Clock;
pub use clock::SystemClock;
pub use outcome::Outcome;
pub use outcome::PollError;
pub use outcome::CANCELED_REASON;
pub use policy::Backoff;
pub use policy::PolicyError;
pub use policy::PollPolicy;
pub use poller::Poller;
pub use probe::Probe;
pub use probe::ProbeResult;
pub use tokio_util::sync::CancellationToken;

/// Poll `probe` under `policy` on the calling thread until a terminal outcome.
pub fn poll<P: Probe>(probe: P, policy: &PollPolicy) -> Outcome {
    Poller::new(policy.clone()).poll(probe)
}

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::outcome::Outcome;
use crate::outcome::CANCELED_REASON;
use crate::policy::PollPolicy;
use crate::probe::Probe;
use crate::probe::ProbeResult;

/// Repeats a probe until it converges, fails fatally, is cancelled or times out.
///
/// A poller holds no state between polls; the same poller can be reused and
/// several pollers can run at once on different threads or tasks.
#[derive(Debug, Clone)]
pub struct Poller<C = SystemClock> {
    policy: PollPolicy,
    clock: C,
    cancel: Option<CancellationToken>,
    operation: Cow<'static, str>,
}

impl Poller<SystemClock> {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            clock: SystemClock,
            cancel: None,
            operation: Cow::Borrowed("poll"),
        }
    }

    /// Async counterpart of [`Poller::poll`] driven by the tokio timer.
    ///
    /// The sleep between attempts is raced against the cancellation token, so
    /// a cancelled poll returns without waiting out the interval.
    pub async fn poll_async<F, Fut>(&self, mut probe: F) -> Outcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProbeResult>,
    {
        let start = tokio::time::Instant::now();
        let mut wait = self.policy.interval();
        let mut attempt = 0u32;

        let outcome = loop {
            if self.is_cancelled() {
                break canceled();
            }

            attempt += 1;
            let reason = match probe().await {
                ProbeResult::Success => break Outcome::Converged,
                ProbeResult::Fatal(reason) => break Outcome::Aborted { reason },
                ProbeResult::Retryable(reason) => reason,
            };

            if self.deadline_reached(start.elapsed(), wait, attempt, &reason) {
                break Outcome::TimedOut {
                    last_reason: reason,
                };
            }

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => break canceled(),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => tokio::time::sleep(wait).await,
            }
            wait = self.policy.next_interval(wait);
        };

        self.report(&outcome, attempt, start.elapsed());
        outcome
    }
}

impl<C: Clock> Poller<C> {
    /// Stop polling once `token` is cancelled.
    ///
    /// The token is checked before every probe and before every sleep.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Name used in log records for this poll.
    pub fn with_operation(mut self, operation: impl Into<Cow<'static, str>>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_clock<D: Clock>(self, clock: D) -> Poller<D> {
        Poller {
            policy: self.policy,
            clock,
            cancel: self.cancel,
            operation: self.operation,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Poll on the calling thread, blocking between attempts.
    pub fn poll<P: Probe>(&self, mut probe: P) -> Outcome {
        let start = self.clock.now();
        let mut wait = self.policy.interval();
        let mut attempt = 0u32;

        let outcome = loop {
            if self.is_cancelled() {
                break canceled();
            }

            attempt += 1;
            let reason = match probe.probe() {
                ProbeResult::Success => break Outcome::Converged,
                ProbeResult::Fatal(reason) => break Outcome::Aborted { reason },
                ProbeResult::Retryable(reason) => reason,
            };

            let elapsed = self.clock.now().saturating_duration_since(start);
            if self.deadline_reached(elapsed, wait, attempt, &reason) {
                break Outcome::TimedOut {
                    last_reason: reason,
                };
            }

            if self.is_cancelled() {
                break canceled();
            }

            self.clock.sleep(wait);
            wait = self.policy.next_interval(wait);
        };

        self.report(
            &outcome,
            attempt,
            self.clock.now().saturating_duration_since(start),
        );
        outcome
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// True when the next attempt would not start before the deadline.
    fn deadline_reached(&self, elapsed: Duration, wait: Duration, attempt: u32, reason: &str) -> bool {
        debug!(
            operation = %self.operation,
            attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            next_wait_ms = wait.as_millis() as u64,
            reason,
            "probe not converged yet"
        );
        elapsed.saturating_add(wait) >= self.policy.timeout()
    }

    fn report(&self, outcome: &Outcome, attempts: u32, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match outcome {
            Outcome::Converged => info!(
                operation = %self.operation,
                attempts,
                elapsed_ms,
                "converged"
            ),
            Outcome::TimedOut { last_reason } => warn!(
                operation = %self.operation,
                attempts,
                elapsed_ms,
                last_reason = %last_reason,
                outcome = outcome.kind(),
                "gave up waiting for convergence"
            ),
            Outcome::Aborted { reason } => warn!(
                operation = %self.operation,
                attempts,
                elapsed_ms,
                reason = %reason,
                outcome = outcome.kind(),
                "poll aborted"
            ),
        }
    }
}

fn canceled() -> Outcome {
    Outcome::Aborted {
        reason: CANCELED_REASON.to_string(),
    }
}

//! Eventually-consistent condition polling
//!
//! Delivery counters and webhook logs lag the actions that change them.
//! The poller samples a probe at a fixed interval until a predicate over
//! the sampled state holds or a deadline expires. The probe runs once per
//! tick, sequentially; the first tick happens before any sleep, so a probe
//! is issued at least once even with a zero timeout.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a probe error affects the poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbePolicy {
    /// Log the error, treat the tick as no-signal, keep polling.
    #[default]
    FailOpen,
    /// Abort the poll with [`PollOutcome::ProbeFailed`].
    FailFast,
}

/// Verdict of a poll
#[derive(Debug)]
pub enum PollOutcome<S, E> {
    /// The predicate held; `state` is the satisfying observation.
    Satisfied {
        state: S,
        ticks: u32,
        elapsed: Duration,
    },
    /// The deadline expired; `last` is the most recent good observation.
    TimedOut {
        last: Option<S>,
        ticks: u32,
        elapsed: Duration,
    },
    /// A probe failed under [`ProbePolicy::FailFast`].
    ProbeFailed {
        error: E,
        ticks: u32,
        elapsed: Duration,
    },
    /// The cancellation token fired before the predicate held.
    Cancelled {
        last: Option<S>,
        ticks: u32,
        elapsed: Duration,
    },
}

impl<S, E> PollOutcome<S, E> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }

    /// The satisfying state, or the last observation if there was one
    pub fn state(&self) -> Option<&S> {
        match self {
            PollOutcome::Satisfied { state, .. } => Some(state),
            PollOutcome::TimedOut { last, .. } | PollOutcome::Cancelled { last, .. } => {
                last.as_ref()
            }
            PollOutcome::ProbeFailed { .. } => None,
        }
    }

    /// Probe invocations made before the verdict
    pub fn ticks(&self) -> u32 {
        match self {
            PollOutcome::Satisfied { ticks, .. }
            | PollOutcome::TimedOut { ticks, .. }
            | PollOutcome::ProbeFailed { ticks, .. }
            | PollOutcome::Cancelled { ticks, .. } => *ticks,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollOutcome::Satisfied { elapsed, .. }
            | PollOutcome::TimedOut { elapsed, .. }
            | PollOutcome::ProbeFailed { elapsed, .. }
            | PollOutcome::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    /// Short verdict label for logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Satisfied { .. } => "satisfied",
            PollOutcome::TimedOut { .. } => "timed out",
            PollOutcome::ProbeFailed { .. } => "probe failed",
            PollOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Fixed-interval, deadline-bounded poller
///
/// Callers construct one per wait and hand it the probe and predicate;
/// there is no shared polling machinery behind it.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    timeout: Duration,
    policy: ProbePolicy,
    cancel: CancellationToken,
}

impl Poller {
    /// Default gap between poll ticks
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            timeout,
            policy: ProbePolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_policy(mut self, policy: ProbePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Tie this poll to a suite-level abort token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `probe` until `predicate` holds or the deadline passes.
    ///
    /// The predicate is checked on a fresh observation before any sleep.
    /// The deadline is checked after each unsatisfied tick, which bounds
    /// the overshoot of a timed-out poll to one interval plus the final
    /// probe's own duration.
    pub async fn run<S, E, P, Fut, F>(&self, mut probe: P, predicate: F) -> PollOutcome<S, E>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<S, E>>,
        F: Fn(&S) -> bool,
        E: fmt::Display,
    {
        let start = Instant::now();
        let mut ticks: u32 = 0;
        let mut last: Option<S> = None;

        loop {
            if self.cancel.is_cancelled() {
                return PollOutcome::Cancelled {
                    last,
                    ticks,
                    elapsed: start.elapsed(),
                };
            }

            ticks += 1;
            match probe().await {
                Ok(state) => {
                    if predicate(&state) {
                        let elapsed = start.elapsed();
                        debug!(ticks, elapsed_ms = elapsed.as_millis() as u64, "condition satisfied");
                        return PollOutcome::Satisfied { state, ticks, elapsed };
                    }
                    debug!(ticks, "condition not yet satisfied");
                    last = Some(state);
                }
                Err(error) => match self.policy {
                    ProbePolicy::FailOpen => {
                        warn!(ticks, %error, "probe failed, continuing");
                    }
                    ProbePolicy::FailFast => {
                        return PollOutcome::ProbeFailed {
                            error,
                            ticks,
                            elapsed: start.elapsed(),
                        };
                    }
                },
            }

            if start.elapsed() >= self.timeout {
                return PollOutcome::TimedOut {
                    last,
                    ticks,
                    elapsed: start.elapsed(),
                };
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return PollOutcome::Cancelled {
                        last,
                        ticks,
                        elapsed: start.elapsed(),
                    };
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_zero_timeout_probes_exactly_once() {
        let calls = AtomicU32::new(0);
        let poller = Poller::new(Duration::ZERO).with_interval(Duration::from_millis(10));

        let outcome: PollOutcome<u32, std::io::Error> = poller
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(0u32) }
                },
                |n| *n > 0,
            )
            .await;

        assert!(matches!(outcome, PollOutcome::TimedOut { last: Some(0), .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_on_probe_error() {
        let poller = Poller::new(Duration::from_secs(5))
            .with_interval(Duration::from_millis(10))
            .with_policy(ProbePolicy::FailFast);

        let outcome: PollOutcome<u32, String> = poller
            .run(|| async { Err("boom".to_string()) }, |_| true)
            .await;

        match outcome {
            PollOutcome::ProbeFailed { error, ticks, .. } => {
                assert_eq!(error, "boom");
                assert_eq!(ticks, 1);
            }
            other => panic!("expected ProbeFailed, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_fail_open_keeps_polling_through_errors() {
        let calls = AtomicU32::new(0);
        let poller = Poller::new(Duration::from_secs(5)).with_interval(Duration::from_millis(5));

        let outcome: PollOutcome<u32, String> = poller
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if n < 3 {
                            Err("flaky scrape".to_string())
                        } else {
                            Ok(n)
                        }
                    }
                },
                |n| *n >= 3,
            )
            .await;

        assert!(outcome.is_satisfied());
        assert_eq!(outcome.ticks(), 3);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let poller = Poller::new(Duration::from_secs(5)).with_cancellation(cancel);
        let outcome: PollOutcome<u32, String> =
            poller.run(|| async { Ok(1u32) }, |_| true).await;

        assert!(matches!(outcome, PollOutcome::Cancelled { ticks: 0, .. }));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let poller = Poller::new(Duration::from_secs(60))
            .with_interval(Duration::from_secs(60))
            .with_cancellation(cancel.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let start = Instant::now();
        let outcome: PollOutcome<u32, String> =
            poller.run(|| async { Ok(0u32) }, |n| *n > 0).await;

        assert!(matches!(outcome, PollOutcome::Cancelled { last: Some(0), .. }));
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "cancellation should cut the 60s sleep short"
        );
    }
}

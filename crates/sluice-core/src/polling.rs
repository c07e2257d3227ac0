//! Poll a condition until it holds, a deadline passes, or shutdown.
//!
//! Used by the existence gate: the first probe runs immediately, later
//! probes follow at a fixed interval, and the final sleep is clamped so the
//! loop never waits past the deadline.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A condition that can be checked repeatedly.
#[async_trait]
pub trait Probe: Send {
    /// The error type for this probe.
    type Error: std::error::Error + Send;

    /// Check the condition once. `Ok(false)` means "not yet".
    async fn probe(&mut self) -> Result<bool, Self::Error>;
}

/// How a polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The probe reported the condition as met.
    Ready { probes: u32, elapsed: Duration },
    /// The deadline passed before the condition was met.
    TimedOut { probes: u32, elapsed: Duration },
    /// Shutdown was requested.
    Shutdown,
}

/// Run `probe` every `interval` until it succeeds or `timeout` elapses.
///
/// Probe errors end the loop and are returned as-is.
pub async fn poll_until<P: Probe>(
    probe: &mut P,
    interval: Duration,
    timeout: Duration,
    shutdown: &CancellationToken,
    name: &str,
) -> Result<PollOutcome, P::Error> {
    let start = Instant::now();
    let mut probes = 0;

    loop {
        let ready = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(target = name, "Shutdown requested while probing");
                return Ok(PollOutcome::Shutdown);
            }

            result = probe.probe() => result?,
        };
        probes += 1;

        let elapsed = start.elapsed();
        if ready {
            return Ok(PollOutcome::Ready { probes, elapsed });
        }
        if elapsed >= timeout {
            return Ok(PollOutcome::TimedOut { probes, elapsed });
        }

        let wait = interval.min(timeout - elapsed);
        debug!(
            target = name,
            probes,
            "Condition not met, waiting {}ms before next probe",
            wait.as_millis()
        );
        if shutdown
            .run_until_cancelled(tokio::time::sleep(wait))
            .await
            .is_none()
        {
            info!(target = name, "Shutdown requested during poll wait");
            return Ok(PollOutcome::Shutdown);
        }
    }
}

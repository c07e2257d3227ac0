//! Existence gate for the source object.
//!
//! Pokes storage immediately and then every `poke_interval` until the
//! object exists. Failing after `timeout` is a precondition failure, not a
//! data error.

use async_trait::async_trait;
use object_store::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use sluice_core::emit;
use sluice_core::metrics::events::SensorPoke;
use sluice_core::storage::StorageProviderRef;
use sluice_core::{PollOutcome, Probe, poll_until};

use crate::error::{GateError, StorageError};

/// Waits for one object to exist.
pub struct ExistenceGate {
    storage: StorageProviderRef,
    object: Path,
    poke_interval: Duration,
    timeout: Duration,
    target: String,
}

struct ObjectProbe<'a> {
    gate: &'a ExistenceGate,
}

#[async_trait]
impl Probe for ObjectProbe<'_> {
    type Error = StorageError;

    async fn probe(&mut self) -> Result<bool, StorageError> {
        let found = self.gate.storage.exists(&self.gate.object).await?;
        emit!(SensorPoke {
            found,
            target: self.gate.target.clone(),
        });
        Ok(found)
    }
}

impl ExistenceGate {
    pub fn new(
        storage: StorageProviderRef,
        object: Path,
        poke_interval: Duration,
        timeout: Duration,
        target: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            object,
            poke_interval,
            timeout,
            target: target.into(),
        }
    }

    /// URL of the awaited object.
    pub fn object_url(&self) -> String {
        self.storage.object_url(&self.object)
    }

    /// Block until the object exists.
    ///
    /// Returns how long the wait took.
    pub async fn wait(&self, shutdown: &CancellationToken) -> Result<Duration, GateError> {
        let object = self.object_url();
        let mut probe = ObjectProbe { gate: self };

        let outcome = poll_until(
            &mut probe,
            self.poke_interval,
            self.timeout,
            shutdown,
            &self.target,
        )
        .await
        .map_err(|source| GateError::Check {
            object: object.clone(),
            source,
        })?;

        match outcome {
            PollOutcome::Ready { probes, elapsed } => {
                info!(target = %self.target, probes, "Found {object}");
                Ok(elapsed)
            }
            PollOutcome::TimedOut { probes, elapsed } => {
                info!(target = %self.target, probes, "Gave up waiting for {object}");
                Err(GateError::Timeout {
                    object,
                    waited_secs: elapsed.as_secs(),
                })
            }
            PollOutcome::Shutdown => Err(GateError::Cancelled { object }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::storage::StorageProvider;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Instant;
    use tempfile::TempDir;

    async fn gate(dir: &TempDir, poke: Duration, timeout: Duration) -> ExistenceGate {
        let storage =
            StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();
        ExistenceGate::new(Arc::new(storage), Path::from("data.csv"), poke, timeout, "test")
    }

    #[tokio::test]
    async fn test_present_object_passes_immediately() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.csv"), b"country\n").unwrap();
        let gate = gate(&dir, Duration::from_secs(30), Duration::from_secs(300)).await;

        let start = Instant::now();
        gate.wait(&CancellationToken::new()).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_object_appearing_later() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, Duration::from_millis(20), Duration::from_secs(10)).await;

        let path = dir.path().join("data.csv");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            std::fs::write(path, b"country\n").unwrap();
        });

        gate.wait(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_object_times_out() {
        let dir = TempDir::new().unwrap();
        let poke = Duration::from_millis(40);
        let timeout = Duration::from_millis(150);
        let gate = gate(&dir, poke, timeout).await;

        let start = Instant::now();
        let err = gate.wait(&CancellationToken::new()).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, GateError::Timeout { .. }));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + poke + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_wait() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, Duration::from_secs(30), Duration::from_secs(300)).await;
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = gate.wait(&shutdown).await.unwrap_err();
        assert!(matches!(err, GateError::Cancelled { .. }));
    }
}

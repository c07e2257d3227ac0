//! Object store construction for each backend.

use object_store::gcp::{GoogleCloudStorageBuilder, GoogleConfigKey};
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{GcsConfigSnafu, StorageError};

use super::BackendConfig;

/// A GCS bucket, optionally narrowed to a key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub key: Option<Path>,
}

/// A directory on the local filesystem, used for development runs and tests.
///
/// The directory need not exist. Objects are addressed below `prefix` on a
/// store rooted at `/`, and parent directories are created on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub path: String,
    pub prefix: Path,
}

impl LocalConfig {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            prefix: Path::from(path.as_str()),
            path,
        }
    }
}

impl BackendConfig {
    /// Build the object store and its canonical URL.
    ///
    /// GCS credentials come from the environment (ADC,
    /// `GOOGLE_SERVICE_ACCOUNT*`) unless `options` overrides them, e.g. with
    /// `google_service_account`. Options are ignored for local directories.
    pub(crate) async fn build(
        &self,
        options: &HashMap<String, String>,
    ) -> Result<(Arc<dyn ObjectStore>, String), StorageError> {
        match self {
            BackendConfig::Gcs(gcs) => {
                let store: Arc<dyn ObjectStore> = Arc::new(gcs_store(&gcs.bucket, options)?);
                let url = match &gcs.key {
                    Some(key) => format!("gs://{}/{key}", gcs.bucket),
                    None => format!("gs://{}", gcs.bucket),
                };
                Ok((store, url))
            }
            BackendConfig::Local(local) => {
                let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new());
                Ok((store, format!("file://{}", local.path)))
            }
        }
    }
}

fn gcs_store(
    bucket: &str,
    options: &HashMap<String, String>,
) -> Result<impl ObjectStore, StorageError> {
    let mut builder = GoogleCloudStorageBuilder::from_env()
        .with_bucket_name(bucket)
        .with_retry(RetryConfig::default());

    if let Ok(key) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
        debug!(bucket, "Using service account key from GOOGLE_SERVICE_ACCOUNT_KEY");
        builder = builder.with_service_account_key(&key);
    }

    for (key, value) in options {
        let key: GoogleConfigKey = key.parse().context(GcsConfigSnafu)?;
        builder = builder.with_config(key, value);
    }

    builder.build().context(GcsConfigSnafu)
}

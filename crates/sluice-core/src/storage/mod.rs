//! Object storage abstraction.
//!
//! Provides one interface over Google Cloud Storage and the local
//! filesystem. A `StorageProvider` is constructed once per component and
//! handed to whatever needs it, so tests can point it at a temp directory.

mod backend;
mod url_parser;

pub use backend::{GcsConfig, LocalConfig};
pub use url_parser::{BackendConfig, split_object_url};

use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over different storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider rooted at the given URL.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;
        let (object_store, canonical_url) = config.build(&options).await?;
        Ok(Self {
            config,
            object_store,
            canonical_url,
        })
    }

    /// Create a provider for the location containing `url`, plus the object's
    /// path relative to it.
    pub async fn for_object_url(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<(Self, Path), StorageError> {
        let (parent, name) = split_object_url(url)?;
        let provider = Self::for_url_with_options(parent, options).await?;
        Ok((provider, Path::from(name)))
    }

    /// Check whether an object exists.
    ///
    /// A not-found response yields `Ok(false)`; every other failure is an error.
    pub async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let start = Instant::now();
        let result = self.object_store.head(&self.qualify_path(path)).await;

        let (status, outcome) = match result {
            Ok(_) => (RequestStatus::Success, Ok(true)),
            Err(object_store::Error::NotFound { .. }) => (RequestStatus::NotFound, Ok(false)),
            Err(source) => (RequestStatus::Error, Err(StorageError::ObjectStore { source })),
        };
        record(StorageOperation::Head, status, start);
        outcome
    }

    /// Write bytes to a path, replacing any existing object.
    pub async fn put_bytes(&self, path: &Path, bytes: impl Into<Bytes>) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self
            .object_store
            .put(&path, PutPayload::from(bytes.into()))
            .await;

        let status = if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        };
        record(StorageOperation::Put, status, start);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Qualify a path with the configured key prefix.
    fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Human-readable URL of an object below the provider root.
    pub fn object_url(&self, path: &Path) -> String {
        format!("{}/{}", self.canonical_url.trim_end_matches('/'), path)
    }
}

fn record(operation: StorageOperation, status: RequestStatus, start: Instant) {
    emit!(StorageRequest { operation, status });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

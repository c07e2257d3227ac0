//! Runs one watch as a component of the sluice process.

use sluice_core::{Pipeline, PipelineContext};
use tracing::info;

use crate::config::{WatchConfig, WatchKey};
use crate::error::UploadError;
use crate::upload::Uploader;

/// A single upload pass over one watch directory.
pub struct WatchPipeline {
    key: WatchKey,
    config: WatchConfig,
    context: PipelineContext,
}

impl WatchPipeline {
    pub fn new(key: WatchKey, config: WatchConfig, context: PipelineContext) -> Self {
        Self {
            key,
            config,
            context,
        }
    }
}

impl Pipeline for WatchPipeline {
    type Key = WatchKey;
    type Error = UploadError;

    fn key(&self) -> &WatchKey {
        &self.key
    }

    async fn run(self) -> Result<(), UploadError> {
        let uploader = Uploader::from_config(self.key.clone(), &self.config).await?;

        match self
            .context
            .shutdown
            .run_until_cancelled(uploader.upload_existing_files())
            .await
        {
            Some(result) => {
                result?;
                Ok(())
            }
            None => {
                info!(target = %self.key, "Shutdown requested during upload");
                Ok(())
            }
        }
    }
}

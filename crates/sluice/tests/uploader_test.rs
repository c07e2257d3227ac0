//! Integration tests for the sluice uploader.

use std::collections::HashMap;
use std::path::Path;

use tempfile::TempDir;

use sluice::{UploadSummary, Uploader, WatchConfig, WatchKey, today};

const DATE: &str = "2025-04-27";
const FILE: &str = "global_health_data_2025-04-27.csv";

fn watch_config(watch: &Path, destination: &str) -> WatchConfig {
    WatchConfig {
        directory: watch.to_path_buf(),
        destination: destination.to_string(),
        extension: ".csv".to_string(),
        date_format: "%Y-%m-%d".to_string(),
        utc_offset: "+05:30".to_string(),
        storage_options: HashMap::new(),
    }
}

async fn uploader(watch: &TempDir, destination: &Path) -> Uploader {
    let config = watch_config(watch.path(), &destination.display().to_string());
    Uploader::from_config(WatchKey::new("health"), &config)
        .await
        .unwrap()
}

mod upload_tests {
    use super::*;

    #[tokio::test]
    async fn test_reupload_overwrites() {
        let watch = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();
        let uploader = uploader(&watch, destination.path()).await;

        std::fs::write(watch.path().join(FILE), b"country\nIndia\n").unwrap();
        uploader.upload_files_for(DATE).await.unwrap();

        std::fs::write(watch.path().join(FILE), b"country\nIndia\nKenya\n").unwrap();
        let summary = uploader.upload_files_for(DATE).await.unwrap();

        assert_eq!(summary.uploaded, 1);
        let uploaded = std::fs::read(destination.path().join(FILE)).unwrap();
        assert_eq!(uploaded, b"country\nIndia\nKenya\n");
        assert_eq!(std::fs::read_dir(destination.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_idempotent() {
        let watch = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();
        let uploader = uploader(&watch, destination.path()).await;
        std::fs::write(watch.path().join(FILE), b"country\nIndia\n").unwrap();

        let first = uploader.upload_files_for(DATE).await.unwrap();
        let second = uploader.upload_files_for(DATE).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            std::fs::read(destination.path().join(FILE)).unwrap(),
            b"country\nIndia\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unopenable_file_is_skipped() {
        let watch = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();

        // A dangling symlink cannot be opened, even by root
        std::os::unix::fs::symlink(
            watch.path().join("gone.csv"),
            watch.path().join("broken_2025-04-27.csv"),
        )
        .unwrap();
        std::fs::write(watch.path().join(FILE), b"country\n").unwrap();

        let summary = uploader(&watch, destination.path())
            .await
            .upload_files_for(DATE)
            .await
            .unwrap();

        assert_eq!(
            summary,
            UploadSummary {
                found: 2,
                uploaded: 1,
                skipped: 1,
                bytes: 8,
            }
        );
        assert!(destination.path().join(FILE).exists());
        assert!(!destination.path().join("broken_2025-04-27.csv").exists());
    }

    #[tokio::test]
    async fn test_destination_prefix_is_created() {
        let watch = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let destination = root.path().join("uploads");
        std::fs::write(watch.path().join(FILE), b"x").unwrap();

        uploader(&watch, &destination)
            .await
            .upload_files_for(DATE)
            .await
            .unwrap();

        assert!(destination.join(FILE).exists());
    }

    #[tokio::test]
    async fn test_upload_existing_files_uses_today() {
        let watch = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();
        let offset = "+05:30".parse().unwrap();
        let name = format!("global_health_data_{}.csv", today(offset, "%Y-%m-%d"));
        std::fs::write(watch.path().join(&name), b"country\n").unwrap();

        let summary = uploader(&watch, destination.path())
            .await
            .upload_existing_files()
            .await
            .unwrap();

        // A date rollover between the two `today` calls leaves nothing to upload
        if summary.found == 1 {
            assert!(destination.path().join(&name).exists());
        }
    }
}

mod config_tests {
    use super::*;
    use sluice::UploaderConfig;
    use sluice_core::config::{ConfigPath, load_from_paths};

    #[test]
    fn test_config_dir_merges_watches() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "watches:\n  health:\n    directory: /srv/health\n    destination: gs://bucket/uploads\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "watches:\n  sales:\n    directory: /srv/sales\n    destination: gs://bucket/sales\nglobal:\n  poll_jitter_secs: 3\n",
        )
        .unwrap();

        let config: UploaderConfig =
            load_from_paths(&[ConfigPath::dir(dir.path().to_path_buf())]).unwrap();

        let keys: Vec<_> = config.watches.keys().map(|k| k.id().to_string()).collect();
        assert_eq!(keys, vec!["health", "sales"]);
        assert_eq!(config.global.poll_jitter_secs, 3);
    }

    #[test]
    fn test_duplicate_watch_rejected() {
        let dir = TempDir::new().unwrap();
        let yaml = "watches:\n  health:\n    directory: /srv/health\n    destination: gs://bucket/uploads\n";
        std::fs::write(dir.path().join("a.yaml"), yaml).unwrap();
        std::fs::write(dir.path().join("b.yaml"), yaml).unwrap();

        let result: Result<UploaderConfig, _> =
            load_from_paths(&[ConfigPath::dir(dir.path().to_path_buf())]);
        assert!(result.unwrap_err().to_string().contains("health"));
    }
}

mod pipeline_tests {
    use super::*;
    use sluice::WatchPipeline;
    use sluice_core::{GlobalConfig, Pipeline, PipelineContext};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_pipeline_run_uploads() {
        let watch = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();
        let offset = "+05:30".parse().unwrap();
        let name = format!("data_{}.csv", today(offset, "%Y-%m-%d"));
        std::fs::write(watch.path().join(&name), b"country\n").unwrap();

        let config = watch_config(watch.path(), &destination.path().display().to_string());
        let context = PipelineContext::new(&GlobalConfig::default(), CancellationToken::new());
        let pipeline = WatchPipeline::new(WatchKey::new("health"), config, context);

        pipeline.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_pipeline_bad_destination_fails() {
        let watch = TempDir::new().unwrap();
        let config = watch_config(watch.path(), "s3://not-supported/uploads");
        let context = PipelineContext::new(&GlobalConfig::default(), CancellationToken::new());
        let pipeline = WatchPipeline::new(WatchKey::new("health"), config, context);

        assert!(pipeline.run().await.is_err());
    }
}

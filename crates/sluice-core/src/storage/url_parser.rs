//! URL parsing for storage backends.
//!
//! Extracts backend configuration from GCS and local filesystem URL formats.

use object_store::path::Path;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{GcsConfig, LocalConfig};

const GCS_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-_\.]+)\.storage\.googleapis\.com(/(?P<key>.+))?$";
const GCS_PATH: &str =
    r"^https://storage\.googleapis\.com/(?P<bucket>[a-z0-9\-_\.]+)(/(?P<key>.+))?$";
const GCS_URL: &str = r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

static GCS_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [GCS_PATH, GCS_VIRTUAL, GCS_URL]
        .into_iter()
        .map(|p| Regex::new(p).expect("GCS url pattern is valid"))
        .collect()
});

static LOCAL_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [FILE_URI, FILE_URL, FILE_PATH]
        .into_iter()
        .map(|p| Regex::new(p).expect("file url pattern is valid"))
        .collect()
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Gcs(GcsConfig),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        if let Some(caps) = GCS_MATCHERS.iter().find_map(|r| r.captures(url)) {
            let bucket = caps["bucket"].to_string();
            let key = caps
                .name("key")
                .map(|m| m.as_str().trim_end_matches('/'))
                .filter(|k| !k.is_empty())
                .map(Path::from);
            return Ok(BackendConfig::Gcs(GcsConfig { bucket, key }));
        }

        if let Some(caps) = LOCAL_MATCHERS.iter().find_map(|r| r.captures(url)) {
            let path = &caps["path"];
            let path = if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            };
            return Ok(BackendConfig::Local(LocalConfig::new(path)));
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::Gcs(gcs) => gcs.key.as_ref(),
            BackendConfig::Local(local) => Some(&local.prefix),
        }
    }
}

/// Split an object URL into its containing location and object name.
///
/// ```
/// use sluice_core::storage::split_object_url;
///
/// let (parent, name) = split_object_url("gs://bucket/uploads/data.csv").unwrap();
/// assert_eq!(parent, "gs://bucket/uploads");
/// assert_eq!(name, "data.csv");
/// ```
pub fn split_object_url(url: &str) -> Result<(&str, &str), StorageError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[scheme_end..].rfind('/') {
        Some(idx) => {
            let split = scheme_end + idx;
            let (parent, name) = (&url[..split], &url[split + 1..]);
            if name.is_empty() || parent.len() <= scheme_end {
                return Err(StorageError::MissingObjectName {
                    url: url.to_string(),
                });
            }
            Ok((parent, name))
        }
        None => Err(StorageError::MissingObjectName {
            url: url.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcs_url_parsing() {
        let config = BackendConfig::parse_url("gs://data-bucket/uploads").unwrap();
        match config {
            BackendConfig::Gcs(gcs) => {
                assert_eq!(gcs.bucket, "data-bucket");
                assert_eq!(gcs.key, Some(Path::from("uploads")));
            }
            _ => panic!("Expected Gcs config"),
        }
    }

    #[test]
    fn test_gcs_bucket_only() {
        let config = BackendConfig::parse_url("gs://data-bucket").unwrap();
        assert_eq!(
            config,
            BackendConfig::Gcs(GcsConfig {
                bucket: "data-bucket".to_string(),
                key: None,
            })
        );
    }

    #[test]
    fn test_gcs_trailing_slash() {
        let config = BackendConfig::parse_url("gs://data-bucket/uploads/").unwrap();
        assert_eq!(config.key(), Some(&Path::from("uploads")));
    }

    #[test]
    fn test_gcs_path_style_url() {
        let config =
            BackendConfig::parse_url("https://storage.googleapis.com/data-bucket/uploads").unwrap();
        match config {
            BackendConfig::Gcs(gcs) => {
                assert_eq!(gcs.bucket, "data-bucket");
                assert_eq!(gcs.key, Some(Path::from("uploads")));
            }
            _ => panic!("Expected Gcs config"),
        }
    }

    #[test]
    fn test_gcs_virtual_hosted_url() {
        let config =
            BackendConfig::parse_url("https://data-bucket.storage.googleapis.com/uploads").unwrap();
        match config {
            BackendConfig::Gcs(gcs) => assert_eq!(gcs.bucket, "data-bucket"),
            _ => panic!("Expected Gcs config"),
        }
    }

    #[test]
    fn test_local_forms() {
        for url in ["/srv/drop", "file:///srv/drop", "file:/srv/drop"] {
            match BackendConfig::parse_url(url).unwrap() {
                BackendConfig::Local(local) => {
                    assert_eq!(local.path, "/srv/drop", "failed for {url}");
                    assert_eq!(local.prefix, Path::from("srv/drop"));
                }
                _ => panic!("Expected Local config for {url}"),
            }
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(BackendConfig::parse_url("s3://bucket/key").is_err());
        assert!(BackendConfig::parse_url("relative/path").is_err());
    }

    #[test]
    fn test_split_object_url() {
        assert_eq!(
            split_object_url("gs://b/uploads/global_health_data_2025-04-27.csv").unwrap(),
            ("gs://b/uploads", "global_health_data_2025-04-27.csv")
        );
        assert_eq!(split_object_url("gs://b/file.csv").unwrap(), ("gs://b", "file.csv"));
        assert_eq!(
            split_object_url("/tmp/landing/file.csv").unwrap(),
            ("/tmp/landing", "file.csv")
        );
    }

    #[test]
    fn test_split_object_url_without_name() {
        assert!(split_object_url("gs://b/uploads/").is_err());
        assert!(split_object_url("gs://bucket").is_err());
        assert!(split_object_url("/file.csv").is_err());
    }
}

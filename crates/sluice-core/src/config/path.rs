//! Configuration path types for multi-file loading.

use std::path::PathBuf;

use clap::Parser;

/// A configuration source - either a single file or a directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigPath {
    /// A single configuration file.
    File(PathBuf),
    /// A directory containing configuration files.
    Dir(PathBuf),
}

impl ConfigPath {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self::Dir(path.into())
    }

    /// Files first, then directories, preserving order within each group.
    pub fn from_cli_args(config_files: &[PathBuf], config_dirs: &[PathBuf]) -> Vec<Self> {
        config_files
            .iter()
            .map(ConfigPath::file)
            .chain(config_dirs.iter().map(ConfigPath::dir))
            .collect()
    }
}

/// Check if a path has a YAML extension.
pub fn is_yaml_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

#[derive(Parser, Debug)]
#[command(version)]
pub struct CliArgs {
    /// Path to configuration file (can be specified multiple times)
    #[arg(short, long)]
    pub config: Vec<PathBuf>,

    /// Path to configuration directory (can be specified multiple times)
    #[arg(short = 'C', long = "config-dir")]
    pub config_dirs: Vec<PathBuf>,
}

impl CliArgs {
    /// Convert CLI arguments to configuration paths.
    pub fn config_paths(&self) -> Vec<ConfigPath> {
        ConfigPath::from_cli_args(&self.config, &self.config_dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_is_yaml_file() {
        assert!(is_yaml_file(Path::new("spillway.yaml")));
        assert!(is_yaml_file(Path::new("sluice.yml")));
        assert!(!is_yaml_file(Path::new("spillway.toml")));
        assert!(!is_yaml_file(Path::new("README")));
    }

    #[test]
    fn test_cli_args_ordering() {
        let args = CliArgs::parse_from([
            "sluice",
            "-C",
            "/etc/sluice.d",
            "-c",
            "a.yaml",
            "--config",
            "b.yaml",
        ]);
        assert_eq!(
            args.config_paths(),
            vec![
                ConfigPath::file("a.yaml"),
                ConfigPath::file("b.yaml"),
                ConfigPath::dir("/etc/sluice.d"),
            ]
        );
    }
}

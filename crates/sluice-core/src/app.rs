//! Application abstraction for reducing main.rs boilerplate.
//!
//! Both binaries share the same lifecycle: initialize tracing, parse CLI
//! arguments, load and validate config, run every configured component
//! once, and map the outcome to an exit code.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use crate::config::{CliArgs, ConfigPath, Mergeable, load_from_paths};
use crate::error::ConfigError;
use crate::topology::{Pipeline, PipelineContext, run_pipelines};
use crate::tracing::init_tracing;

/// Trait for application configurations that can be loaded and run.
///
/// `Mergeable` already provides `metrics()`, `global()` and the component
/// name used in logs.
pub trait AppConfig: Mergeable {
    /// The pipeline type this config produces.
    type Pipeline: Pipeline;

    /// Load config from paths with validation.
    fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        load_from_paths(paths)
    }

    /// Create pipelines from this config.
    fn create_pipelines(&self, context: PipelineContext) -> Vec<Self::Pipeline>;

    /// Log startup info (component count and details).
    fn log_startup_info(&self);

    /// Called once after every component finished successfully.
    fn on_success(&self) {}
}

/// Application runner that handles the full startup lifecycle.
pub struct Application<C: AppConfig> {
    config: C,
}

impl<C: AppConfig> Application<C> {
    /// Full application lifecycle: parse args, load config, run pipelines.
    pub fn run() -> ExitCode {
        init_tracing();

        let args = CliArgs::parse();
        let paths = args.config_paths();

        if paths.is_empty() {
            eprintln!("Error: no config files or directories specified");
            return ExitCode::FAILURE;
        }

        let source_count = paths.len();
        info!("Loading config from {source_count} source(s)");

        match Self::from_paths(&paths) {
            Ok(app) => app.execute(),
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                ExitCode::FAILURE
            }
        }
    }

    /// Load config from paths (useful for testing).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config = C::from_paths(paths)?;
        Ok(Self { config })
    }

    /// Execute the application (after config is loaded).
    fn execute(self) -> ExitCode {
        self.config.log_startup_info();

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                eprintln!("Failed to start async runtime: {e}");
                return ExitCode::FAILURE;
            }
        };

        let result = runtime.block_on(run_pipelines(
            self.config.metrics().address.as_deref(),
            self.config.global(),
            C::COMPONENT_NAME,
            |context| self.config.create_pipelines(context),
        ));

        match result {
            Ok(()) => {
                self.config.on_success();
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} run failed: {e}", C::COMPONENT_NAME);
                ExitCode::FAILURE
            }
        }
    }
}

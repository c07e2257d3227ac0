//! Sluice CLI: uploads today's dated CSV files to object storage and exits.

use std::process::ExitCode;

use sluice::UploaderConfig;
use sluice_core::Application;

fn main() -> ExitCode {
    Application::<UploaderConfig>::run()
}

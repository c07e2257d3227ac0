//! Spillway CLI: runs each configured workflow once, concurrently, and exits.

use std::process::ExitCode;

use sluice_core::Application;
use spillway::SpillwayConfig;

fn main() -> ExitCode {
    Application::<SpillwayConfig>::run()
}

#![allow(clippy::multiple_crate_versions)]

//! Strata - depth-layered clock wallpapers.
//!
//! Logging goes to stderr and is controlled by `STRATA_LOG`
//! (e.g. `STRATA_LOG=strata_lib=debug`).

use strata_lib::constants::{APP_ID, DEFAULT_LOG_FILTER, LOG_ENV};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn main() {
    init_tracing();

    if let Err(err) = strata_lib::cli::run() {
        eprintln!("{APP_ID}: {err}");
        std::process::exit(1);
    }
}

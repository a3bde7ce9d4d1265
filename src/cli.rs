//! Start-up plumbing shared by the binaries.

use clap::error::{Error, ErrorKind};
use std::process::ExitCode;
use tracing::Level;

/// `-v` raises the level to debug, `-vv` to trace. `RUST_LOG` directives
/// still apply on top. Output goes to stderr so stdout stays scriptable.
pub fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Help and version requests succeed; every other parse failure is a usage
/// error with exit status 1.
pub fn parse_error_exit(err: Error) -> ExitCode {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

pub fn report_failure(err: &anyhow::Error) -> ExitCode {
    eprintln!("ERROR: {:#}", err);
    ExitCode::FAILURE
}

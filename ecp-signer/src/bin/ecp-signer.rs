//! Signer subprocess of the enterprise certificate proxy.

use std::process::ExitCode;

use clap::Parser;
use ecp_common::logging::setup_logging_from_env;
use ecp_signer::cli::Cli;
use log::{debug, error};

/// Serves calls for the configured key on standard input and output.
fn main() -> ExitCode {
    if let Err(error) = setup_logging_from_env() {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(error) => {
            error!("Signer is not meant to be invoked manually, exiting...");
            debug!("{error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = ecp_signer::run(&args.config) {
        error!(error:err; "Signer failed: {error}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

//! A signer echoing digests, for tests of clients.

use std::{
    env::args_os,
    io::{stdin, stdout},
    process::ExitCode,
};

use ecp_common::logging::setup_logging_from_env;
use ecp_rpc::Transport;
use ecp_tests::mock::MockSigner;

/// Serves calls on standard input and output until the client closes the connection.
fn main() -> ExitCode {
    if let Err(error) = setup_logging_from_env() {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    if args_os().len() != 2 {
        log::error!("Signer is not meant to be invoked manually, exiting...");
        return ExitCode::FAILURE;
    }

    let signer = match MockSigner::generate() {
        Ok(signer) => signer,
        Err(error) => {
            log::error!("Creating the mock signer failed: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut transport = Transport::new(stdin().lock(), stdout().lock());
    if let Err(error) = signer.serve(&mut transport) {
        log::error!(error:err; "Serving calls failed: {error}");
        return ExitCode::FAILURE;
    }
    if let Err(error) = transport.close() {
        log::error!(error:err; "Closing the transport failed: {error}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

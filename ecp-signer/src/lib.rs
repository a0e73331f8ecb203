#![doc = include_str!("../README.md")]

pub mod backend;
pub mod cli;
mod error;
pub mod provider;
mod service;
pub mod watchdog;

use std::{
    io::{stdin, stdout},
    path::Path,
};

use ecp_common::config::CertificateConfig;
use ecp_rpc::Transport;
pub use error::Error;
use log::info;
pub use service::Service;

/// Serves calls on standard input and output for the key configured in the file at `config_path`.
///
/// Returns once the client closes standard input.
///
/// # Errors
///
/// Returns an error if
///
/// - the configuration can not be read,
/// - no key can be loaded for the configuration,
/// - the parent watchdog can not be started,
/// - or serving calls fails.
pub fn run(config_path: &Path) -> Result<(), Error> {
    let config = CertificateConfig::from_file(config_path)?;
    let provider = backend::load_provider(&config.cert_configs)?;
    watchdog::spawn()?;

    info!("Serving calls for {config_path:?}");
    let mut transport = Transport::new(stdin().lock(), stdout().lock());
    Service::new(provider).serve(&mut transport)?;
    transport.close().map_err(|source| Error::Io {
        context: "closing standard input and output",
        source,
    })
}

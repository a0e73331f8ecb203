//! Command line interface for `ecp-signer`.

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments of the signer.
#[derive(Debug, Parser)]
#[command(
    about = "Serve signing calls for an enterprise certificate client.",
    long_about = "Serve signing calls for an enterprise certificate client.

The signer is started by a client library, which talks to it over standard input and output.
It is not meant to be invoked manually."
)]
pub struct Cli {
    /// The enterprise certificate configuration file.
    pub config: PathBuf,
}

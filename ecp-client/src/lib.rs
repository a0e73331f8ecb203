#![doc = include_str!("../README.md")]

mod error;
mod key;
mod public_key;
pub mod tls;

use std::path::Path;

use ecp_common::config::{load_signer_binary_path, resolve_config_path};
pub use ecp_rpc::{HashAlgorithm, SaltLength, SignerOpts};
pub use error::Error;
pub use key::{DEFAULT_OAEP_HASH, Key};
use log::debug;
pub use public_key::PublicKey;

/// Starts the signer named in the enterprise certificate configuration and returns its [`Key`].
///
/// The configuration file is `config_path` if it is set and not empty, otherwise the file named
/// by the `GOOGLE_API_CERTIFICATE_CONFIG` environment variable, otherwise the default location.
///
/// # Errors
///
/// Returns an error if
///
/// - the configuration file does not exist or names no signer binary (see
///   [`Error::is_config_unavailable`]),
/// - the configuration file can not be read or parsed,
/// - or the signer can not be started or fails to provide its certificate chain and public key.
pub fn cred(config_path: Option<&Path>) -> Result<Key, Error> {
    let config_path = resolve_config_path(config_path);
    debug!("Using enterprise certificate config {config_path:?}");
    let signer = load_signer_binary_path(&config_path)?;
    Key::spawn(&signer, &config_path)
}

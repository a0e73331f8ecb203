//! Error handling for the client.

use std::path::PathBuf;

/// An error that may occur when using a signer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration error.
    #[error(transparent)]
    Config(#[from] ecp_common::config::Error),

    /// The signer subprocess can not be started.
    #[error("Error starting signer subprocess {path}:\n{source}")]
    Spawn {
        /// The signer binary.
        path: PathBuf,

        /// The source error.
        source: std::io::Error,
    },

    /// A call to the signer failed.
    #[error("{operation} call to the signer failed:\n{source}")]
    Rpc {
        /// The name of the call.
        operation: &'static str,

        /// The source error.
        source: ecp_rpc::Error,
    },

    /// The signer returned an empty certificate chain.
    #[error("The signer returned an empty certificate chain")]
    EmptyCertificateChain,

    /// The public key returned by the signer is not valid DER.
    #[error("Unable to decode the public key of the signer:\n{0}")]
    PublicKey(#[from] rsa::pkcs8::spki::Error),

    /// The public key returned by the signer uses an unsupported algorithm.
    #[error("Unsupported public key algorithm {algorithm}")]
    UnsupportedPublicKey {
        /// The object identifier of the algorithm.
        algorithm: String,
    },

    /// A certificate can not be PEM encoded.
    #[error("PEM encoding error: {0}")]
    Pem(rsa::pkcs8::der::pem::Error),

    /// The connection to the signer can not be closed.
    #[error("Closing the connection to the signer failed:\n{0}")]
    ConnectionClose(#[source] std::io::Error),

    /// The signer subprocess can not be killed.
    #[error("Killing the signer subprocess failed:\n{0}")]
    Kill(#[source] std::io::Error),

    /// Waiting for the signer subprocess to exit failed.
    #[error("Waiting for the signer subprocess failed:\n{0}")]
    Wait(#[source] std::io::Error),

    /// A TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}

impl Error {
    /// Returns whether the configuration (or the signer binary named in it) is unavailable.
    ///
    /// Callers may use this to fall back to connections without a client certificate.
    pub fn is_config_unavailable(&self) -> bool {
        matches!(self, Self::Config(error) if error.is_config_unavailable())
    }

    /// Returns the error message of the signer if a call failed on the signer's side.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Rpc {
                source: ecp_rpc::Error::Remote(message),
                ..
            } => Some(message),
            _ => None,
        }
    }
}

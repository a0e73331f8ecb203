//! Error handling for the signer.

use std::path::PathBuf;

/// An error that may occur in the signer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration error.
    #[error(transparent)]
    Config(#[from] ecp_common::config::Error),

    /// A logging setup error.
    #[error(transparent)]
    Logging(#[from] ecp_common::logging::Error),

    /// A wire protocol error.
    #[error("Wire protocol error:\n{0}")]
    Rpc(#[from] ecp_rpc::Error),

    /// An I/O error.
    #[error("I/O error while {context}:\n{source}")]
    Io {
        /// The short description of the operation.
        ///
        /// This is meant to complete the sentence "I/O error while ".
        context: &'static str,

        /// The source error.
        source: std::io::Error,
    },

    /// A PEM file can not be read or parsed.
    #[error("PEM error at {path} while {context}: {source}")]
    Pem {
        /// The PEM file.
        path: PathBuf,

        /// The short description of the operation.
        ///
        /// This is meant to complete the sentence "PEM error at path while ".
        context: &'static str,

        /// The source error.
        source: rustls_pki_types::pem::Error,
    },

    /// A PEM file does not contain any certificate.
    #[error("No certificate found in {path}")]
    NoCertificate {
        /// The PEM file.
        path: PathBuf,
    },

    /// A private key uses an algorithm or encoding that is not supported.
    #[error("Unsupported private key in {path}, expected an RSA, P-256 or P-384 key")]
    UnsupportedKey {
        /// The PEM file.
        path: PathBuf,
    },

    /// An RSA error.
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    /// An ECDSA error.
    #[error("ECDSA error: {0}")]
    Ecdsa(#[from] p256::ecdsa::Error),

    /// A public key can not be encoded.
    #[error("Public key encoding error: {0}")]
    Spki(#[from] rsa::pkcs8::spki::Error),

    /// The length of a digest does not match the size of the requested hash algorithm.
    #[error("Digest length of {actual} bytes does not match Hash function size of {expected} bytes")]
    DigestLength {
        /// The length of the digest.
        actual: usize,

        /// The size of a digest of the requested hash algorithm.
        expected: usize,
    },

    /// A PSS salt does not fit into the encoded message of the key.
    #[error("Salt length of {actual} bytes exceeds the maximum of {max} bytes for this key")]
    SaltLength {
        /// The requested salt length.
        actual: usize,

        /// The largest salt length the key permits.
        max: usize,
    },

    /// The key does not support an operation.
    #[error("The key does not support {operation}")]
    UnsupportedOperation {
        /// The name of the operation.
        operation: &'static str,
    },

    /// No keystore backend is configured.
    #[error("No keystore backend is configured")]
    NoBackend,

    /// A configured keystore backend is not available in this build.
    #[error("The {backend} keystore backend is not available in this build")]
    BackendUnavailable {
        /// The name of the backend.
        backend: &'static str,
    },
}

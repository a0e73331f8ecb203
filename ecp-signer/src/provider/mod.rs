//! Access to a private key and its certificate chain.

mod software;

use ecp_rpc::{HashAlgorithm, SignerOpts};
pub use software::SoftwareProvider;

use crate::Error;

/// A private key and its certificate chain, held in some keystore.
///
/// Keystore handles are owned by the implementation and released when it is dropped.
pub trait KeyProvider {
    /// Returns the DER encoded certificate chain, leaf first.
    ///
    /// # Errors
    ///
    /// If the operation fails, the implementation should return an appropriate error.
    fn certificate_chain(&self) -> Result<Vec<Vec<u8>>, Error>;

    /// Returns the DER encoded public key (SubjectPublicKeyInfo).
    ///
    /// The key matches the public key of the leaf certificate.
    ///
    /// # Errors
    ///
    /// If the operation fails, the implementation should return an appropriate error.
    fn public_key_der(&self) -> Result<Vec<u8>, Error>;

    /// Signs a digest.
    ///
    /// The `opts` select padding and hash algorithm. Without `opts` the digest is signed as is.
    /// Callers ensure that the length of `digest` matches the hash algorithm of `opts`.
    ///
    /// # Errors
    ///
    /// If the operation fails, the implementation should return an appropriate error.
    fn sign(&self, digest: &[u8], opts: Option<SignerOpts>) -> Result<Vec<u8>, Error>;

    /// Encrypts `plaintext` with the public key, using `hash` for OAEP padding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] unless the implementation supports encryption.
    fn encrypt(&self, plaintext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        let _ = (plaintext, hash);
        Err(Error::UnsupportedOperation {
            operation: "Encrypt",
        })
    }

    /// Decrypts `ciphertext` with the private key, using `hash` for OAEP padding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] unless the implementation supports decryption.
    fn decrypt(&self, ciphertext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        let _ = (ciphertext, hash);
        Err(Error::UnsupportedOperation {
            operation: "Decrypt",
        })
    }
}

impl<P: KeyProvider + ?Sized> KeyProvider for Box<P> {
    fn certificate_chain(&self) -> Result<Vec<Vec<u8>>, Error> {
        (**self).certificate_chain()
    }

    fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        (**self).public_key_der()
    }

    fn sign(&self, digest: &[u8], opts: Option<SignerOpts>) -> Result<Vec<u8>, Error> {
        (**self).sign(digest, opts)
    }

    fn encrypt(&self, plaintext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        (**self).encrypt(plaintext, hash)
    }

    fn decrypt(&self, ciphertext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        (**self).decrypt(ciphertext, hash)
    }
}

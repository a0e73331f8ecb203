//! Public keys of signers.

use rsa::{
    RsaPublicKey,
    pkcs8::{
        DecodePublicKey,
        spki::{self, SubjectPublicKeyInfoRef},
    },
};

use crate::Error;

/// The public key of a signer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublicKey {
    /// An RSA public key.
    Rsa(RsaPublicKey),

    /// An ECDSA public key on NIST P-256.
    EcdsaP256(p256::PublicKey),

    /// An ECDSA public key on NIST P-384.
    EcdsaP384(p384::PublicKey),

    /// An Ed25519 public key.
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    /// Decodes a DER encoded SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// Returns an error if
    ///
    /// - `der` is not a SubjectPublicKeyInfo,
    /// - or the key is not an RSA, P-256, P-384 or Ed25519 key.
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let info = SubjectPublicKeyInfoRef::try_from(der).map_err(spki::Error::from)?;

        if let Ok(key) = RsaPublicKey::from_public_key_der(der) {
            return Ok(Self::Rsa(key));
        }
        if let Ok(key) = p256::PublicKey::from_public_key_der(der) {
            return Ok(Self::EcdsaP256(key));
        }
        if let Ok(key) = p384::PublicKey::from_public_key_der(der) {
            return Ok(Self::EcdsaP384(key));
        }
        if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_der(der) {
            return Ok(Self::Ed25519(key));
        }

        Err(Error::UnsupportedPublicKey {
            algorithm: info.algorithm.oid.to_string(),
        })
    }

    /// Returns the key type: `RSA`, `EC` or `ED25519`.
    pub fn key_type(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::EcdsaP256(_) | Self::EcdsaP384(_) => "EC",
            Self::Ed25519(_) => "ED25519",
        }
    }
}

//! A key provider reading a certificate chain and a private key from PEM files.

use std::{
    fmt::{Debug, Formatter},
    path::Path,
};

use ecp_common::config::Software;
use ecp_rpc::{HashAlgorithm, SaltLength, SignerOpts};
use log::debug;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use rsa::{
    Oaep,
    Pkcs1v15Sign,
    Pss,
    RsaPrivateKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePublicKey},
    traits::PublicKeyParts,
};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::{Error, provider::KeyProvider};

/// A private key held in memory.
enum PrivateKey {
    Rsa(RsaPrivateKey),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl PrivateKey {
    fn algorithm(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::P256(_) => "ECDSA P-256",
            Self::P384(_) => "ECDSA P-384",
        }
    }

    /// Parses a DER encoded private key in any of the encodings found in PEM files.
    fn from_der(der: &PrivateKeyDer<'_>) -> Option<Self> {
        match der {
            PrivateKeyDer::Pkcs1(key) => RsaPrivateKey::from_pkcs1_der(key.secret_pkcs1_der())
                .ok()
                .map(Self::Rsa),
            PrivateKeyDer::Sec1(key) => {
                let der = key.secret_sec1_der();
                p256::SecretKey::from_sec1_der(der)
                    .ok()
                    .map(|secret| Self::P256(secret.into()))
                    .or_else(|| {
                        p384::SecretKey::from_sec1_der(der)
                            .ok()
                            .map(|secret| Self::P384(secret.into()))
                    })
            }
            PrivateKeyDer::Pkcs8(key) => {
                let der = key.secret_pkcs8_der();
                RsaPrivateKey::from_pkcs8_der(der)
                    .ok()
                    .map(Self::Rsa)
                    .or_else(|| {
                        p256::ecdsa::SigningKey::from_pkcs8_der(der)
                            .ok()
                            .map(Self::P256)
                    })
                    .or_else(|| {
                        p384::ecdsa::SigningKey::from_pkcs8_der(der)
                            .ok()
                            .map(Self::P384)
                    })
            }
            _ => None,
        }
    }

    fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        let document = match self {
            Self::Rsa(key) => key.to_public_key().to_public_key_der()?,
            Self::P256(key) => p256::PublicKey::from(key.verifying_key()).to_public_key_der()?,
            Self::P384(key) => p384::PublicKey::from(key.verifying_key()).to_public_key_der()?,
        };
        Ok(document.as_bytes().to_vec())
    }
}

/// Reads the certificate chain and private key of the software keystore backend.
///
/// RSA keys sign with PKCS#1 v1.5 or RSASSA-PSS and support RSAES-OAEP encryption.
/// ECDSA keys on NIST P-256 and P-384 create ASN.1 DER encoded signatures.
pub struct SoftwareProvider {
    chain: Vec<Vec<u8>>,
    public_key_der: Vec<u8>,
    key: PrivateKey,
}

impl Debug for SoftwareProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareProvider")
            .field("chain_len", &self.chain.len())
            .field("algorithm", &self.key.algorithm())
            .finish_non_exhaustive()
    }
}

impl SoftwareProvider {
    /// Creates a new [`SoftwareProvider`] from the files named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if
    ///
    /// - the certificate chain file can not be read or contains no certificate,
    /// - the private key file can not be read,
    /// - or the private key is not a supported RSA, P-256 or P-384 key.
    pub fn from_config(config: &Software) -> Result<Self, Error> {
        let chain = read_certificate_chain(&config.cert_chain)?;
        let key = read_private_key(&config.private_key)?;
        debug!(
            "Loaded a {} key with a chain of {} certificates",
            key.algorithm(),
            chain.len()
        );

        Ok(Self {
            chain,
            public_key_der: key.public_key_der()?,
            key,
        })
    }
}

impl KeyProvider for SoftwareProvider {
    fn certificate_chain(&self) -> Result<Vec<Vec<u8>>, Error> {
        Ok(self.chain.clone())
    }

    fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        Ok(self.public_key_der.clone())
    }

    fn sign(&self, digest: &[u8], opts: Option<SignerOpts>) -> Result<Vec<u8>, Error> {
        match &self.key {
            PrivateKey::Rsa(key) => sign_rsa(key, digest, opts),
            PrivateKey::P256(key) => {
                reject_pss(opts)?;
                let signature: p256::ecdsa::Signature = key.sign_prehash(digest)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            PrivateKey::P384(key) => {
                reject_pss(opts)?;
                let signature: p384::ecdsa::Signature = key.sign_prehash(digest)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }

    fn encrypt(&self, plaintext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        let PrivateKey::Rsa(key) = &self.key else {
            return Err(Error::UnsupportedOperation {
                operation: "Encrypt",
            });
        };
        Ok(key
            .to_public_key()
            .encrypt(&mut rand::thread_rng(), oaep(hash), plaintext)?)
    }

    fn decrypt(&self, ciphertext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        let PrivateKey::Rsa(key) = &self.key else {
            return Err(Error::UnsupportedOperation {
                operation: "Decrypt",
            });
        };
        Ok(key.decrypt(oaep(hash), ciphertext)?)
    }
}

fn read_certificate_chain(path: &Path) -> Result<Vec<Vec<u8>>, Error> {
    let pem_error = |source| Error::Pem {
        path: path.to_path_buf(),
        context: "reading the certificate chain",
        source,
    };
    let chain = CertificateDer::pem_file_iter(path)
        .map_err(pem_error)?
        .map(|certificate| certificate.map(|certificate| certificate.as_ref().to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(pem_error)?;
    if chain.is_empty() {
        return Err(Error::NoCertificate {
            path: path.to_path_buf(),
        });
    }
    Ok(chain)
}

fn read_private_key(path: &Path) -> Result<PrivateKey, Error> {
    let der = PrivateKeyDer::from_pem_file(path).map_err(|source| Error::Pem {
        path: path.to_path_buf(),
        context: "reading the private key",
        source,
    })?;
    PrivateKey::from_der(&der).ok_or_else(|| Error::UnsupportedKey {
        path: path.to_path_buf(),
    })
}

fn reject_pss(opts: Option<SignerOpts>) -> Result<(), Error> {
    match opts {
        Some(SignerOpts::Pss { .. }) => Err(Error::UnsupportedOperation {
            operation: "RSASSA-PSS",
        }),
        _ => Ok(()),
    }
}

fn sign_rsa(key: &RsaPrivateKey, digest: &[u8], opts: Option<SignerOpts>) -> Result<Vec<u8>, Error> {
    let signature = match opts {
        None => key.sign(Pkcs1v15Sign::new_unprefixed(), digest)?,
        Some(SignerOpts::Hash { hash }) => key.sign(pkcs1v15(hash), digest)?,
        Some(SignerOpts::Pss { hash, salt_length }) => {
            // the largest salt fitting into the encoded message
            let max = key.size().saturating_sub(hash.size() + 2);
            let salt_len = match salt_length {
                SaltLength::Auto => max,
                SaltLength::EqualsHash => hash.size(),
                SaltLength::Bytes(len) => len,
            };
            if salt_len > max {
                return Err(Error::SaltLength {
                    actual: salt_len,
                    max,
                });
            }
            key.sign_with_rng(&mut rand::thread_rng(), pss(hash, salt_len), digest)?
        }
    };
    Ok(signature)
}

fn pkcs1v15(hash: HashAlgorithm) -> Pkcs1v15Sign {
    match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

fn pss(hash: HashAlgorithm, salt_len: usize) -> Pss {
    match hash {
        HashAlgorithm::Sha1 => Pss::new_with_salt::<Sha1>(salt_len),
        HashAlgorithm::Sha224 => Pss::new_with_salt::<Sha224>(salt_len),
        HashAlgorithm::Sha256 => Pss::new_with_salt::<Sha256>(salt_len),
        HashAlgorithm::Sha384 => Pss::new_with_salt::<Sha384>(salt_len),
        HashAlgorithm::Sha512 => Pss::new_with_salt::<Sha512>(salt_len),
    }
}

fn oaep(hash: HashAlgorithm) -> Oaep {
    match hash {
        HashAlgorithm::Sha1 => Oaep::new::<Sha1>(),
        HashAlgorithm::Sha224 => Oaep::new::<Sha224>(),
        HashAlgorithm::Sha256 => Oaep::new::<Sha256>(),
        HashAlgorithm::Sha384 => Oaep::new::<Sha384>(),
        HashAlgorithm::Sha512 => Oaep::new::<Sha512>(),
    }
}

#[cfg(test)]
mod tests {
    use ecp_tests::fixture::{
        KeyAlgorithm,
        SoftwareKey,
        certificate_contains_public_key,
        write_software_key,
    };
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use rsa::{RsaPublicKey, pkcs8::DecodePublicKey};
    use rstest::rstest;
    use sha2::Digest;
    use tempfile::{TempDir, tempdir};
    use testresult::TestResult;

    use super::*;

    fn provider(algorithm: KeyAlgorithm) -> TestResult<(TempDir, SoftwareKey, SoftwareProvider)> {
        let dir = tempdir()?;
        let key = write_software_key(dir.path(), algorithm)?;
        let provider = SoftwareProvider::from_config(&key.cert_config())?;
        Ok((dir, key, provider))
    }

    #[rstest]
    #[case(KeyAlgorithm::Rsa)]
    #[case(KeyAlgorithm::P256)]
    #[case(KeyAlgorithm::P384)]
    fn public_key_matches_leaf_certificate(#[case] algorithm: KeyAlgorithm) -> TestResult {
        let (_dir, key, provider) = provider(algorithm)?;

        let chain = provider.certificate_chain()?;
        assert_eq!(chain, vec![key.certificate_der]);
        assert!(certificate_contains_public_key(
            &chain[0],
            &provider.public_key_der()?
        ));
        Ok(())
    }

    #[rstest]
    #[case(SignerOpts::Hash { hash: HashAlgorithm::Sha256 }, Pkcs1v15Sign::new::<Sha256>())]
    #[case(SignerOpts::pss(HashAlgorithm::Sha256), Pss::new_with_salt::<Sha256>(32))]
    #[case(
        SignerOpts::Pss { hash: HashAlgorithm::Sha256, salt_length: SaltLength::Bytes(20) },
        Pss::new_with_salt::<Sha256>(20)
    )]
    #[case(
        SignerOpts::Pss { hash: HashAlgorithm::Sha256, salt_length: SaltLength::Auto },
        Pss::new_with_salt::<Sha256>(256 - 32 - 2)
    )]
    fn rsa_signatures_verify(
        #[case] opts: SignerOpts,
        #[case] scheme: impl rsa::traits::SignatureScheme,
    ) -> TestResult {
        let (_dir, _key, provider) = provider(KeyAlgorithm::Rsa)?;
        let digest = Sha256::digest(b"message");

        let signature = provider.sign(&digest, Some(opts))?;

        RsaPublicKey::from_public_key_der(&provider.public_key_der()?)?.verify(
            scheme,
            &digest,
            &signature,
        )?;
        Ok(())
    }

    #[rstest]
    #[case(SaltLength::Bytes(1 << 40))]
    #[case(SaltLength::Bytes(256 - 32 - 1))]
    fn oversized_pss_salt_is_rejected(#[case] salt_length: SaltLength) -> TestResult {
        let (_dir, _key, provider) = provider(KeyAlgorithm::Rsa)?;
        let digest = Sha256::digest(b"message");

        let result = provider.sign(
            &digest,
            Some(SignerOpts::Pss {
                hash: HashAlgorithm::Sha256,
                salt_length,
            }),
        );

        assert!(matches!(result, Err(Error::SaltLength { max: 222, .. })));
        // the provider stays usable
        provider.sign(&digest, Some(SignerOpts::pss(HashAlgorithm::Sha256)))?;
        Ok(())
    }

    #[test]
    fn rsa_raw_signature_verifies() -> TestResult {
        let (_dir, _key, provider) = provider(KeyAlgorithm::Rsa)?;
        let data = b"prefixed digest";

        let signature = provider.sign(data, None)?;

        RsaPublicKey::from_public_key_der(&provider.public_key_der()?)?.verify(
            Pkcs1v15Sign::new_unprefixed(),
            data,
            &signature,
        )?;
        Ok(())
    }

    #[test]
    fn rsa_encryption_round_trip() -> TestResult {
        let (_dir, _key, provider) = provider(KeyAlgorithm::Rsa)?;

        let ciphertext = provider.encrypt(b"plaintext", HashAlgorithm::Sha256)?;

        assert_ne!(ciphertext, b"plaintext");
        assert_eq!(
            provider.decrypt(&ciphertext, HashAlgorithm::Sha256)?,
            b"plaintext"
        );
        Ok(())
    }

    #[test]
    fn p256_signature_verifies() -> TestResult {
        let (_dir, _key, provider) = provider(KeyAlgorithm::P256)?;
        let digest = Sha256::digest(b"message");

        let signature = provider.sign(
            &digest,
            Some(SignerOpts::Hash {
                hash: HashAlgorithm::Sha256,
            }),
        )?;

        let verifying_key = p256::ecdsa::VerifyingKey::from_public_key_der(&provider.public_key_der()?)?;
        verifying_key.verify_prehash(&digest, &p256::ecdsa::Signature::from_der(&signature)?)?;
        Ok(())
    }

    #[test]
    fn p384_signature_verifies() -> TestResult {
        let (_dir, _key, provider) = provider(KeyAlgorithm::P384)?;
        let digest = sha2::Sha384::digest(b"message");

        let signature = provider.sign(
            &digest,
            Some(SignerOpts::Hash {
                hash: HashAlgorithm::Sha384,
            }),
        )?;

        let verifying_key = p384::ecdsa::VerifyingKey::from_public_key_der(&provider.public_key_der()?)?;
        verifying_key.verify_prehash(&digest, &p384::ecdsa::Signature::from_der(&signature)?)?;
        Ok(())
    }

    #[test]
    fn ecdsa_keys_reject_pss_and_encryption() -> TestResult {
        let (_dir, _key, provider) = provider(KeyAlgorithm::P256)?;
        let digest = Sha256::digest(b"message");

        assert!(matches!(
            provider.sign(&digest, Some(SignerOpts::pss(HashAlgorithm::Sha256))),
            Err(Error::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            provider.encrypt(b"plaintext", HashAlgorithm::Sha256),
            Err(Error::UnsupportedOperation {
                operation: "Encrypt"
            })
        ));
        Ok(())
    }

    #[test]
    fn certificate_file_without_certificates_is_rejected() -> TestResult {
        let dir = tempdir()?;
        let key = write_software_key(dir.path(), KeyAlgorithm::P256)?;
        std::fs::write(&key.cert_chain, "")?;

        assert!(matches!(
            SoftwareProvider::from_config(&key.cert_config()),
            Err(Error::NoCertificate { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_private_key_is_an_error() -> TestResult {
        let dir = tempdir()?;
        let key = write_software_key(dir.path(), KeyAlgorithm::P256)?;
        std::fs::remove_file(&key.private_key)?;

        assert!(matches!(
            SoftwareProvider::from_config(&key.cert_config()),
            Err(Error::Pem { .. })
        ));
        Ok(())
    }
}

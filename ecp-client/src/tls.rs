//! Client authentication with [`rustls`].
//!
//! A [`Key`] is shared between a [`ClientCertResolver`] and the [`Signer`]s created for
//! handshakes. Messages to sign are hashed locally and only the digest is sent to the signer.

use std::sync::Arc;

use ecp_rpc::{HashAlgorithm, SignerOpts};
use log::debug;
use rustls::{
    ClientConfig,
    RootCertStore,
    SignatureAlgorithm,
    SignatureScheme,
    client::ResolvesClientCert,
    crypto::ring,
    sign::{CertifiedKey, Signer, SigningKey},
};
use rustls_pki_types::CertificateDer;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::{Error, Key, PublicKey};

/// Signature schemes for RSA keys, in order of preference.
const RSA_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::RSA_PSS_SHA256,
    SignatureScheme::RSA_PSS_SHA384,
    SignatureScheme::RSA_PSS_SHA512,
    SignatureScheme::RSA_PKCS1_SHA256,
    SignatureScheme::RSA_PKCS1_SHA384,
    SignatureScheme::RSA_PKCS1_SHA512,
];

/// A [`Key`] usable as the private key of a TLS client certificate.
#[derive(Clone, Debug)]
pub struct SignerKey {
    key: Arc<Key>,
}

impl SignerKey {
    /// Creates a new [`SignerKey`].
    pub fn new(key: Arc<Key>) -> Self {
        Self { key }
    }

    /// Returns the signature schemes supported by the key, in order of preference.
    pub fn schemes(&self) -> &'static [SignatureScheme] {
        match self.key.public() {
            PublicKey::Rsa(_) => RSA_SCHEMES,
            PublicKey::EcdsaP256(_) => &[SignatureScheme::ECDSA_NISTP256_SHA256],
            PublicKey::EcdsaP384(_) => &[SignatureScheme::ECDSA_NISTP384_SHA384],
            PublicKey::Ed25519(_) => &[SignatureScheme::ED25519],
        }
    }
}

impl SigningKey for SignerKey {
    fn choose_scheme(&self, offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
        let scheme = *self
            .schemes()
            .iter()
            .find(|scheme| offered.contains(scheme))?;
        debug!("Chose signature scheme {scheme:?}");
        Some(Box::new(KeySigner {
            key: self.key.clone(),
            scheme,
        }))
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        match self.key.public() {
            PublicKey::Rsa(_) => SignatureAlgorithm::RSA,
            PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) => SignatureAlgorithm::ECDSA,
            PublicKey::Ed25519(_) => SignatureAlgorithm::ED25519,
        }
    }
}

/// Signs handshake messages with one signature scheme.
#[derive(Debug)]
struct KeySigner {
    key: Arc<Key>,
    scheme: SignatureScheme,
}

impl Signer for KeySigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, rustls::Error> {
        let (digest, opts) = prepare(self.scheme, message)?;
        self.key
            .sign(&digest, opts.as_ref())
            .map_err(|error| rustls::Error::General(error.to_string()))
    }

    fn scheme(&self) -> SignatureScheme {
        self.scheme
    }
}

/// Returns the digest to sign and the signing options for a message signed with `scheme`.
///
/// Ed25519 signs the message itself.
fn prepare(
    scheme: SignatureScheme,
    message: &[u8],
) -> Result<(Vec<u8>, Option<SignerOpts>), rustls::Error> {
    let (hash, pss, digest) = match scheme {
        SignatureScheme::RSA_PSS_SHA256 => (HashAlgorithm::Sha256, true, hashed::<Sha256>(message)),
        SignatureScheme::RSA_PSS_SHA384 => (HashAlgorithm::Sha384, true, hashed::<Sha384>(message)),
        SignatureScheme::RSA_PSS_SHA512 => (HashAlgorithm::Sha512, true, hashed::<Sha512>(message)),
        SignatureScheme::RSA_PKCS1_SHA256 | SignatureScheme::ECDSA_NISTP256_SHA256 => {
            (HashAlgorithm::Sha256, false, hashed::<Sha256>(message))
        }
        SignatureScheme::RSA_PKCS1_SHA384 | SignatureScheme::ECDSA_NISTP384_SHA384 => {
            (HashAlgorithm::Sha384, false, hashed::<Sha384>(message))
        }
        SignatureScheme::RSA_PKCS1_SHA512 => {
            (HashAlgorithm::Sha512, false, hashed::<Sha512>(message))
        }
        SignatureScheme::ED25519 => return Ok((message.to_vec(), None)),
        other => {
            return Err(rustls::Error::General(format!(
                "Unsupported signature scheme {other:?}"
            )));
        }
    };

    let opts = if pss {
        SignerOpts::pss(hash)
    } else {
        SignerOpts::from(hash)
    };
    Ok((digest, Some(opts)))
}

fn hashed<D: Digest>(message: &[u8]) -> Vec<u8> {
    D::digest(message).to_vec()
}

/// Presents the certificate chain of a [`Key`] whenever a server asks for a client certificate.
#[derive(Debug)]
pub struct ClientCertResolver {
    signer_key: SignerKey,
    certified_key: Arc<CertifiedKey>,
}

impl ClientCertResolver {
    /// Creates a new [`ClientCertResolver`] for `key`.
    pub fn new(key: Arc<Key>) -> Self {
        let chain = key
            .certificate_chain()
            .iter()
            .map(|certificate| CertificateDer::from(certificate.clone()))
            .collect();
        let signer_key = SignerKey::new(key);
        let certified_key = Arc::new(CertifiedKey::new(chain, Arc::new(signer_key.clone())));
        Self {
            signer_key,
            certified_key,
        }
    }
}

impl ResolvesClientCert for ClientCertResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        if !self
            .signer_key
            .schemes()
            .iter()
            .any(|scheme| sigschemes.contains(scheme))
        {
            debug!("The server accepts none of the signature schemes of the key");
            return None;
        }
        Some(self.certified_key.clone())
    }

    fn has_certs(&self) -> bool {
        true
    }
}

/// Creates a [`ClientConfig`] trusting `roots` and authenticating with `key`.
///
/// # Errors
///
/// Returns an error if the default protocol versions are not supported by the crypto provider.
pub fn client_config(roots: RootCertStore, key: Arc<Key>) -> Result<ClientConfig, Error> {
    Ok(
        ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_client_cert_resolver(Arc::new(ClientCertResolver::new(key))),
    )
}

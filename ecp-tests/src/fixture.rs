//! Keys, certificates and configuration files for tests.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use ecp_common::config::{CertConfigs, CertificateConfig, Libs, Software};
use rcgen::{CertificateParams, KeyPair, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384};
use rsa::{
    RsaPrivateKey,
    pkcs8::{EncodePrivateKey, LineEnding},
};
use testresult::TestResult;

/// The size of generated RSA keys in bits.
pub const RSA_KEY_BITS: usize = 2048;

/// The filename of configuration files written by [`write_config`].
pub const CONFIG_FILE: &str = "certificate_config.json";

/// The algorithm of a generated key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyAlgorithm {
    /// RSA with [`RSA_KEY_BITS`] bits.
    Rsa,
    /// ECDSA on NIST P-256.
    P256,
    /// ECDSA on NIST P-384.
    P384,
}

/// A private key and a self-signed certificate written to PEM files.
#[derive(Clone, Debug)]
pub struct SoftwareKey {
    /// The PEM file containing the certificate.
    pub cert_chain: PathBuf,

    /// The PEM file containing the PKCS#8 encoded private key.
    pub private_key: PathBuf,

    /// The DER encoded certificate.
    pub certificate_der: Vec<u8>,
}

impl SoftwareKey {
    /// Returns the software backend configuration for this key.
    pub fn cert_config(&self) -> Software {
        Software {
            cert_chain: self.cert_chain.clone(),
            private_key: self.private_key.clone(),
        }
    }
}

/// Generates a key and a self-signed certificate for `localhost` and writes both to `dir`.
///
/// # Errors
///
/// Returns an error if the key or certificate can not be created or written.
pub fn write_software_key(dir: &Path, algorithm: KeyAlgorithm) -> TestResult<SoftwareKey> {
    let key_pair = match algorithm {
        KeyAlgorithm::Rsa => {
            let key = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)?;
            KeyPair::from_pem(&key.to_pkcs8_pem(LineEnding::LF)?)?
        }
        KeyAlgorithm::P256 => KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?,
        KeyAlgorithm::P384 => KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384)?,
    };
    let certificate =
        CertificateParams::new(vec!["localhost".to_string()])?.self_signed(&key_pair)?;

    let cert_chain = dir.join("cert.pem");
    let private_key = dir.join("key.pem");
    File::create_new(&cert_chain)?.write_all(certificate.pem().as_bytes())?;
    File::create_new(&private_key)?.write_all(key_pair.serialize_pem().as_bytes())?;

    Ok(SoftwareKey {
        cert_chain,
        private_key,
        certificate_der: certificate.der().to_vec(),
    })
}

/// A certificate and PKCS#8 private key for a TLS server named `localhost`, both DER encoded.
#[derive(Clone, Debug)]
pub struct ServerIdentity {
    /// The DER encoded self-signed certificate.
    pub certificate_der: Vec<u8>,

    /// The DER encoded PKCS#8 private key.
    pub private_key_der: Vec<u8>,
}

/// Generates a [`ServerIdentity`] with a P-256 key.
///
/// # Errors
///
/// Returns an error if the certificate can not be generated.
pub fn server_identity() -> TestResult<ServerIdentity> {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
    Ok(ServerIdentity {
        certificate_der: cert.der().to_vec(),
        private_key_der: signing_key.serialize_der(),
    })
}

/// Returns a configuration naming the `signer` binary and the keystore backends in `cert_configs`.
pub fn signer_config(signer: &Path, cert_configs: CertConfigs) -> CertificateConfig {
    CertificateConfig {
        libs: Libs {
            ecp: signer.to_string_lossy().into_owned(),
            ..Default::default()
        },
        cert_configs,
    }
}

/// Writes `config` to [`CONFIG_FILE`] in `dir` and returns the path of the file.
///
/// # Errors
///
/// Returns an error if the file can not be written.
pub fn write_config(dir: &Path, config: &CertificateConfig) -> TestResult<PathBuf> {
    let path = dir.join(CONFIG_FILE);
    let mut file = File::create(&path)?;
    serde_json::to_writer_pretty(&mut file, config)?;
    file.flush()?;
    Ok(path)
}

/// Returns whether the DER encoded `certificate` embeds the DER encoded `public_key`.
///
/// The SubjectPublicKeyInfo of a certificate is included verbatim in its DER encoding.
pub fn certificate_contains_public_key(certificate: &[u8], public_key: &[u8]) -> bool {
    !public_key.is_empty()
        && certificate
            .windows(public_key.len())
            .any(|window| window == public_key)
}

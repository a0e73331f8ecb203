//! A key held by a signer subprocess.

use std::{
    path::Path,
    process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio},
    sync::{Mutex, MutexGuard, PoisonError},
};

use ecp_rpc::{Connection, DecryptArgs, EncryptArgs, HashAlgorithm, SignArgs, SignerOpts, Transport};
use log::{debug, warn};
use rsa::pkcs8::der::pem::{LineEnding, encode_string};

use crate::{Error, PublicKey};

/// The hash algorithm used for OAEP padding by [`Key::encrypt`] and [`Key::decrypt`].
pub const DEFAULT_OAEP_HASH: HashAlgorithm = HashAlgorithm::Sha256;

/// The PEM label of certificates.
const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// The signer subprocess.
///
/// A process that has not been waited for is killed and reaped on drop.
#[derive(Debug)]
struct SignerProcess {
    child: Option<Child>,
}

impl SignerProcess {
    fn kill(&mut self) -> std::io::Result<()> {
        match self.child.as_mut() {
            Some(child) => child.kill(),
            None => Ok(()),
        }
    }

    fn wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.take().map(|mut child| child.wait()).transpose()
    }
}

impl Drop for SignerProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        debug!("Stopping signer subprocess {}", child.id());
        if let Err(error) = child.kill() {
            warn!("Killing signer subprocess {} failed: {error}", child.id());
        }
        if let Err(error) = child.wait() {
            warn!("Waiting for signer subprocess {} failed: {error}", child.id());
        }
    }
}

/// A private key held by a signer subprocess.
///
/// The certificate chain and public key are fetched once, when the signer is started.
/// Every other operation is a call to the signer. Calls are strictly sequential, even if the
/// [`Key`] is shared between threads.
///
/// Use [`Key::close`] to stop the signer and learn about failures. Dropping a [`Key`] kills the
/// signer as well.
#[derive(Debug)]
pub struct Key {
    connection: Mutex<Connection<ChildStdout, ChildStdin>>,
    process: SignerProcess,
    chain: Vec<Vec<u8>>,
    public_key: PublicKey,
    public_key_der: Vec<u8>,
}

impl Key {
    /// Starts the `signer` binary for the configuration file at `config` and fetches its
    /// certificate chain and public key.
    ///
    /// Standard error of the signer is inherited.
    ///
    /// # Errors
    ///
    /// Returns an error if
    ///
    /// - the signer can not be started,
    /// - fetching the certificate chain or public key fails,
    /// - the certificate chain is empty,
    /// - or the public key can not be decoded.
    pub fn spawn(signer: &Path, config: &Path) -> Result<Self, Error> {
        debug!("Starting signer subprocess {signer:?} for {config:?}");
        let spawn_error = |source| Error::Spawn {
            path: signer.to_path_buf(),
            source,
        };
        let mut child = Command::new(signer)
            .arg(config)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;
        let pipes = (child.stdout.take(), child.stdin.take());
        let process = SignerProcess { child: Some(child) };
        let (Some(stdout), Some(stdin)) = pipes else {
            return Err(spawn_error(std::io::Error::other(
                "standard input and output are not piped",
            )));
        };

        let mut connection = Connection::new(Transport::new(stdout, stdin));
        let chain = connection
            .certificate_chain()
            .map_err(rpc_error("CertificateChain"))?;
        if chain.is_empty() {
            return Err(Error::EmptyCertificateChain);
        }
        let public_key_der = connection.public().map_err(rpc_error("Public"))?;
        let public_key = PublicKey::from_der(&public_key_der)?;
        debug!(
            "Signer holds a {} key with a chain of {} certificates",
            public_key.key_type(),
            chain.len()
        );

        Ok(Self {
            connection: Mutex::new(connection),
            process,
            chain,
            public_key,
            public_key_der,
        })
    }

    /// Returns the process ID of the signer subprocess, unless it has been waited for.
    pub fn process_id(&self) -> Option<u32> {
        self.process.child.as_ref().map(Child::id)
    }

    /// Returns the DER encoded certificate chain, leaf first.
    pub fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    /// Returns the certificate chain as concatenated PEM `CERTIFICATE` blocks, leaf first.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate can not be PEM encoded.
    pub fn certificate_chain_pem(&self) -> Result<String, Error> {
        self.chain
            .iter()
            .map(|certificate| {
                encode_string(CERTIFICATE_LABEL, LineEnding::LF, certificate).map_err(Error::Pem)
            })
            .collect()
    }

    /// Returns the public key.
    pub fn public(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the DER encoded public key (SubjectPublicKeyInfo).
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// Returns the key type: `RSA`, `EC` or `ED25519`.
    pub fn key_type(&self) -> &'static str {
        self.public_key.key_type()
    }

    /// Signs a digest.
    ///
    /// The digest is passed to the signer as is. If `opts` are set, the signer pads according to
    /// them and checks that the length of `digest` matches their hash algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer can not be reached or fails to sign.
    pub fn sign(&self, digest: &[u8], opts: Option<&SignerOpts>) -> Result<Vec<u8>, Error> {
        self.connection()
            .sign(SignArgs::new(digest, opts.copied()))
            .map_err(rpc_error("Sign"))
    }

    /// Encrypts `plaintext` with RSAES-OAEP using SHA-256.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer can not be reached or fails to encrypt.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.encrypt_with_hash(plaintext, DEFAULT_OAEP_HASH)
    }

    /// Encrypts `plaintext` with RSAES-OAEP using `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer can not be reached or fails to encrypt.
    pub fn encrypt_with_hash(
        &self,
        plaintext: &[u8],
        hash: HashAlgorithm,
    ) -> Result<Vec<u8>, Error> {
        self.connection()
            .encrypt(EncryptArgs {
                plaintext: plaintext.to_vec(),
                hash,
            })
            .map_err(rpc_error("Encrypt"))
    }

    /// Decrypts `ciphertext` with RSAES-OAEP using SHA-256.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer can not be reached or fails to decrypt.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        self.decrypt_with_hash(ciphertext, DEFAULT_OAEP_HASH)
    }

    /// Decrypts `ciphertext` with RSAES-OAEP using `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer can not be reached or fails to decrypt.
    pub fn decrypt_with_hash(
        &self,
        ciphertext: &[u8],
        hash: HashAlgorithm,
    ) -> Result<Vec<u8>, Error> {
        self.connection()
            .decrypt(DecryptArgs {
                ciphertext: ciphertext.to_vec(),
                hash,
            })
            .map_err(rpc_error("Decrypt"))
    }

    /// Closes the connection, kills the signer subprocess and waits for it to exit.
    ///
    /// All three steps are attempted, even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure in the order
    ///
    /// - closing the connection ([`Error::ConnectionClose`]),
    /// - killing the subprocess ([`Error::Kill`]),
    /// - waiting for the subprocess ([`Error::Wait`]).
    pub fn close(self) -> Result<(), Error> {
        let Self {
            connection,
            mut process,
            ..
        } = self;

        let closed = connection
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .close()
            .map_err(Error::ConnectionClose);
        let killed = process.kill().map_err(Error::Kill);
        let waited = process.wait().map_err(Error::Wait);
        if let Ok(Some(status)) = waited.as_ref() {
            debug!("Signer subprocess exited with {status}");
        }

        closed.and(killed).and(waited.map(|_| ()))
    }

    fn connection(&self) -> MutexGuard<'_, Connection<ChildStdout, ChildStdin>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn rpc_error(operation: &'static str) -> impl Fn(ecp_rpc::Error) -> Error {
    move |source| Error::Rpc { operation, source }
}

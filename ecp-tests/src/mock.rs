//! A signer answering calls without a keystore.
//!
//! The mock speaks the wire protocol on its own, so it doubles as an independent peer for the
//! client. Signatures are the digest itself and "encryption" inverts every bit.

use std::io::{Read, Write};

use ecp_rpc::{
    Call,
    PROTOCOL_VERSION,
    Reply,
    Request,
    Response,
    Transport,
    codec::{read_frame, write_frame},
};
use log::debug;
use p256::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rcgen::{CertifiedKey, generate_simple_self_signed};

/// An error that may occur when creating a [`MockSigner`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The certificate can not be generated.
    #[error("Certificate generation error: {0}")]
    Certificate(#[from] rcgen::Error),

    /// The generated private key can not be decoded.
    #[error("Private key decoding error: {0}")]
    PrivateKey(#[from] p256::pkcs8::Error),

    /// The public key can not be encoded.
    #[error("Public key encoding error: {0}")]
    PublicKey(#[from] p256::pkcs8::spki::Error),
}

/// A signer that echoes digests instead of signing them.
#[derive(Debug)]
pub struct MockSigner {
    certificate_der: Vec<u8>,
    public_key_der: Vec<u8>,
}

impl MockSigner {
    /// Creates a [`MockSigner`] with a freshly generated P-256 certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate can not be generated.
    pub fn generate() -> Result<Self, Error> {
        let CertifiedKey { cert, signing_key } =
            generate_simple_self_signed(vec!["localhost".into()])?;
        let public_key_der = p256::SecretKey::from_pkcs8_pem(&signing_key.serialize_pem())?
            .public_key()
            .to_public_key_der()?
            .as_bytes()
            .to_vec();

        Ok(Self {
            certificate_der: cert.der().to_vec(),
            public_key_der,
        })
    }

    /// Answers one request.
    pub fn handle(&self, request: Request) -> Response {
        if request.version != PROTOCOL_VERSION {
            return Response::error(
                request.id,
                format!(
                    "Unsupported protocol version {}, expected {PROTOCOL_VERSION}",
                    request.version
                ),
            );
        }

        let reply = match request.call {
            Call::CertificateChain => Reply::CertificateChain(vec![self.certificate_der.clone()]),
            Call::Public => Reply::Public(self.public_key_der.clone()),
            Call::Sign(args) => {
                if let Some(opts) = args.effective_opts() {
                    let expected = opts.hash().size();
                    if args.digest.len() != expected {
                        return Response::error(
                            request.id,
                            format!(
                                "Digest length of {} bytes does not match Hash function size of {expected} bytes",
                                args.digest.len()
                            ),
                        );
                    }
                }
                Reply::Signature(args.digest)
            }
            Call::Encrypt(args) => Reply::Ciphertext(invert(&args.plaintext)),
            Call::Decrypt(args) => Reply::Plaintext(invert(&args.ciphertext)),
        };
        Response::ok(request.id, reply)
    }

    /// Answers requests on `transport` until the client closes its end.
    ///
    /// # Errors
    ///
    /// Returns an error if a request can not be read or a response can not be written.
    pub fn serve<R: Read, W: Write>(
        &self,
        transport: &mut Transport<R, W>,
    ) -> Result<(), ecp_rpc::Error> {
        while let Some(request) = read_frame::<_, Request>(transport)? {
            debug!("Mock signer received a {} call", request.call.name());
            write_frame(transport, &self.handle(request))?;
        }
        Ok(())
    }
}

fn invert(data: &[u8]) -> Vec<u8> {
    data.iter().map(|byte| !byte).collect()
}

#[cfg(test)]
mod tests {
    use ecp_rpc::{EncryptArgs, HashAlgorithm, SignArgs, SignerOpts};
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[rstest]
    #[case(None, b"testDigest".len(), None)]
    #[case(
        Some(SignerOpts::Hash { hash: HashAlgorithm::Sha256 }),
        10,
        Some("Digest length of 10 bytes does not match Hash function size of 32 bytes")
    )]
    #[case(Some(SignerOpts::pss(HashAlgorithm::Sha384)), 48, None)]
    fn sign_checks_digest_length(
        #[case] opts: Option<SignerOpts>,
        #[case] len: usize,
        #[case] error: Option<&str>,
    ) -> TestResult {
        let signer = MockSigner::generate()?;
        let digest = vec![7u8; len];

        let response = signer.handle(Request::new(1, Call::Sign(SignArgs::new(digest.clone(), opts))));

        assert_eq!(response.error.as_deref(), error);
        if error.is_none() {
            assert_eq!(response.result, Some(Reply::Signature(digest)));
        }
        Ok(())
    }

    #[test]
    fn encryption_is_reversible() -> TestResult {
        let signer = MockSigner::generate()?;
        let response = signer.handle(Request::new(
            1,
            Call::Encrypt(EncryptArgs {
                plaintext: b"plaintext".to_vec(),
                hash: HashAlgorithm::Sha256,
            }),
        ));
        let Some(Reply::Ciphertext(ciphertext)) = response.result else {
            return Err("no ciphertext".into());
        };
        assert_ne!(ciphertext, b"plaintext");
        assert_eq!(invert(&ciphertext), b"plaintext");
        Ok(())
    }

    #[test]
    fn unknown_versions_are_rejected() -> TestResult {
        let signer = MockSigner::generate()?;
        let mut request = Request::new(4, Call::Public);
        request.version = PROTOCOL_VERSION + 1;

        let response = signer.handle(request);

        assert_eq!(response.id, 4);
        assert!(response.result.is_none());
        assert!(response.error.is_some());
        Ok(())
    }
}

//! Dispatching of calls to a [`KeyProvider`].

use std::io::{Read, Write};

use ecp_rpc::{
    Call,
    PROTOCOL_VERSION,
    Reply,
    Request,
    Response,
    SignArgs,
    Transport,
    codec::{read_frame, write_frame},
};
use log::{debug, trace, warn};

use crate::{Error, provider::KeyProvider};

/// Answers calls using a [`KeyProvider`].
///
/// Calls are served one at a time, in the order they arrive.
#[derive(Debug)]
pub struct Service<P> {
    provider: P,
}

impl<P: KeyProvider> Service<P> {
    /// Creates a new [`Service`] for `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Answers one request.
    ///
    /// Failures are reported to the client as error messages in the [`Response`].
    pub fn handle(&self, request: Request) -> Response {
        let id = request.id;
        if request.version != PROTOCOL_VERSION {
            let error = ecp_rpc::Error::UnsupportedVersion {
                actual: request.version,
                expected: PROTOCOL_VERSION,
            };
            warn!("Rejecting request {id}: {error}");
            return Response::error(id, error.to_string());
        }

        let name = request.call.name();
        match self.dispatch(request.call) {
            Ok(reply) => {
                trace!("{name} call {id} succeeded");
                Response::ok(id, reply)
            }
            Err(error) => {
                debug!("{name} call {id} failed: {error}");
                Response::error(id, error.to_string())
            }
        }
    }

    fn dispatch(&self, call: Call) -> Result<Reply, Error> {
        Ok(match call {
            Call::CertificateChain => Reply::CertificateChain(self.provider.certificate_chain()?),
            Call::Public => Reply::Public(self.provider.public_key_der()?),
            Call::Sign(args) => Reply::Signature(self.sign(&args)?),
            Call::Encrypt(args) => {
                Reply::Ciphertext(self.provider.encrypt(&args.plaintext, args.hash)?)
            }
            Call::Decrypt(args) => {
                Reply::Plaintext(self.provider.decrypt(&args.ciphertext, args.hash)?)
            }
        })
    }

    fn sign(&self, args: &SignArgs) -> Result<Vec<u8>, Error> {
        let opts = args.effective_opts();
        if let Some(opts) = opts {
            let expected = opts.hash().size();
            if args.digest.len() != expected {
                return Err(Error::DigestLength {
                    actual: args.digest.len(),
                    expected,
                });
            }
        }
        self.provider.sign(&args.digest, opts)
    }

    /// Answers requests on `transport` until the client closes its end.
    ///
    /// # Errors
    ///
    /// Returns an error if a request can not be read or a response can not be written.
    pub fn serve<R: Read, W: Write>(&self, transport: &mut Transport<R, W>) -> Result<(), Error> {
        while let Some(request) = read_frame::<_, Request>(transport)? {
            write_frame(transport, &self.handle(request))?;
        }
        debug!("Client closed the connection");
        Ok(())
    }
}

//! The client side of a signer session.

use std::io::{Read, Write};

use log::trace;

use crate::{
    Call,
    Close,
    DecryptArgs,
    EncryptArgs,
    Error,
    Reply,
    Request,
    Response,
    SignArgs,
    Transport,
    codec::{read_frame, write_frame},
};

/// A session with a signer on top of a [`Transport`].
///
/// Calls are strictly sequential: a request is only sent once the response to the previous one
/// has been received.
#[derive(Debug)]
pub struct Connection<R, W> {
    transport: Transport<R, W>,
    next_id: u64,
}

impl<R: Read, W: Write> Connection<R, W> {
    /// Creates a new [`Connection`] on top of `transport`.
    pub fn new(transport: Transport<R, W>) -> Self {
        Self {
            transport,
            next_id: 0,
        }
    }

    /// Sends `call` and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns an error if
    ///
    /// - the request can not be written,
    /// - the response can not be read or the signer closed the stream,
    /// - the response does not belong to the request,
    /// - or the signer answers with an error ([`Error::Remote`]).
    pub fn call(&mut self, call: Call) -> Result<Reply, Error> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        trace!("Sending {} request {id}", call.name());

        write_frame(&mut self.transport, &Request::new(id, call))?;
        let response: Response = read_frame(&mut self.transport)?.ok_or(Error::ConnectionClosed)?;
        if response.id != id {
            return Err(Error::UnexpectedResponseId {
                expected: id,
                actual: response.id,
            });
        }
        trace!("Received response {id}");

        response.into_result()
    }

    /// Returns the DER encoded certificate chain of the signer, leaf first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails (see [`Connection::call`]).
    pub fn certificate_chain(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        match self.call(Call::CertificateChain)? {
            Reply::CertificateChain(chain) => Ok(chain),
            other => Err(unexpected("CertificateChain", &other)),
        }
    }

    /// Returns the DER encoded public key of the signer.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails (see [`Connection::call`]).
    pub fn public(&mut self) -> Result<Vec<u8>, Error> {
        match self.call(Call::Public)? {
            Reply::Public(public) => Ok(public),
            other => Err(unexpected("Public", &other)),
        }
    }

    /// Signs a digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails (see [`Connection::call`]).
    pub fn sign(&mut self, args: SignArgs) -> Result<Vec<u8>, Error> {
        match self.call(Call::Sign(args))? {
            Reply::Signature(signature) => Ok(signature),
            other => Err(unexpected("Sign", &other)),
        }
    }

    /// Encrypts data with the public key of the signer.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails (see [`Connection::call`]).
    pub fn encrypt(&mut self, args: EncryptArgs) -> Result<Vec<u8>, Error> {
        match self.call(Call::Encrypt(args))? {
            Reply::Ciphertext(ciphertext) => Ok(ciphertext),
            other => Err(unexpected("Encrypt", &other)),
        }
    }

    /// Decrypts data with the private key of the signer.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails (see [`Connection::call`]).
    pub fn decrypt(&mut self, args: DecryptArgs) -> Result<Vec<u8>, Error> {
        match self.call(Call::Decrypt(args))? {
            Reply::Plaintext(plaintext) => Ok(plaintext),
            other => Err(unexpected("Decrypt", &other)),
        }
    }
}

impl<R: Close, W: Close> Connection<R, W> {
    /// Closes the [`Connection`] and its [`Transport`].
    ///
    /// # Errors
    ///
    /// Returns an error if closing the [`Transport`] fails.
    pub fn close(self) -> std::io::Result<()> {
        self.transport.close()
    }
}

fn unexpected(call: &'static str, reply: &Reply) -> Error {
    Error::UnexpectedReply {
        call,
        actual: reply.name(),
    }
}

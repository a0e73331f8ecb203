//! Wire protocol between an enterprise certificate client and its signer subprocess.
//!
//! The signer holds a private key that never leaves protected storage and answers remote
//! procedure calls on its standard input and output. This crate provides
//!
//! - the [`protocol`] messages and the closed set of signing options that cross the process
//!   boundary,
//! - the [`codec`] framing messages on a byte stream,
//! - the [`Transport`] joining two unidirectional pipes into one duplex stream,
//! - and the client side [`Connection`] issuing strictly sequential calls.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> testresult::TestResult {
//! use std::process::{Command, Stdio};
//!
//! use ecp_rpc::{Connection, Transport};
//!
//! let mut child = Command::new("ecp-signer")
//!     .arg("certificate_config.json")
//!     .stdin(Stdio::piped())
//!     .stdout(Stdio::piped())
//!     .spawn()?;
//! let stdout = child.stdout.take().ok_or("no stdout")?;
//! let stdin = child.stdin.take().ok_or("no stdin")?;
//!
//! let mut connection = Connection::new(Transport::new(stdout, stdin));
//! let chain = connection.certificate_chain()?;
//! println!("The signer holds a chain of {} certificates", chain.len());
//! connection.close()?;
//! # Ok(()) }
//! ```

pub mod codec;
mod connection;
mod error;
pub mod protocol;
mod transport;

pub use connection::Connection;
pub use error::Error;
pub use protocol::{
    Call,
    DecryptArgs,
    EncryptArgs,
    HashAlgorithm,
    PROTOCOL_VERSION,
    Reply,
    Request,
    Response,
    SaltLength,
    SignArgs,
    SignerOpts,
};
pub use transport::{Close, Transport};

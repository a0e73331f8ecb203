//! Test fixtures and a mock signer for the enterprise certificate proxy.
//!
//! The [`fixture`] module writes keys, certificates and configuration files for the software
//! keystore backend. The [`mock`] module provides the signer behind the `ecp-mock-signer` binary,
//! which signs by echoing the digest.

pub mod fixture;
pub mod mock;

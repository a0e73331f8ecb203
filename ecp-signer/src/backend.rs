//! Selection of the keystore backend.

use ecp_common::config::CertConfigs;
use log::{debug, warn};

use crate::{
    Error,
    provider::{KeyProvider, SoftwareProvider},
};

/// Creates the [`KeyProvider`] for the first configured keystore backend.
///
/// Backends are considered in the order software, PKCS#11, macOS Keychain, Windows certificate
/// store. Only the software backend is available in this build.
///
/// # Errors
///
/// Returns an error if
///
/// - no backend is configured,
/// - the selected backend is not available,
/// - or the selected backend can not provide the key.
pub fn load_provider(config: &CertConfigs) -> Result<Box<dyn KeyProvider>, Error> {
    if let Some(software) = config.software.as_ref() {
        debug!("Using the software keystore backend");
        return Ok(Box::new(SoftwareProvider::from_config(software)?));
    }

    if let Some(pkcs11) = config.pkcs11.as_ref() {
        let slot = pkcs11.slot_id()?;
        warn!(
            "PKCS#11 slot {slot:#x} with label {:?} can not be opened",
            pkcs11.label
        );
        return Err(Error::BackendUnavailable { backend: "pkcs11" });
    }

    if config.macos_keychain.is_some() {
        return Err(Error::BackendUnavailable {
            backend: "macos_keychain",
        });
    }

    if config.windows_store.is_some() {
        return Err(Error::BackendUnavailable {
            backend: "windows_store",
        });
    }

    Err(Error::NoBackend)
}

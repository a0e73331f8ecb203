#![doc = include_str!("../README.md")]
// The exported symbols keep the names established by other enterprise certificate libraries.
#![allow(non_snake_case)]

use std::{
    ffi::{CStr, CString, c_char},
    path::Path,
};

use ecp_client::{HashAlgorithm, Key, PublicKey, SaltLength, SignerOpts, cred};
use ecp_common::logging::init_logging_once;
use log::{debug, error};

/// The key type reported for keys that can not be used with [`Sign`].
const UNKNOWN_KEY_TYPE: &str = "unknown";

/// Returns the version of the library.
///
/// The version is taken from the `ECP_VERSION` environment variable at build time, if set.
fn version() -> &'static str {
    option_env!("ECP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Converts `value` to a C string owned by the caller.
///
/// Returns a null pointer if `value` contains a NUL byte.
fn into_c_string(value: &str) -> *mut c_char {
    match CString::new(value) {
        Ok(value) => value.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Returns the configuration path passed by the caller.
///
/// A null pointer or a string that is not UTF-8 selects the default configuration.
///
/// # Safety
///
/// `config` must be null or point to a NUL-terminated string.
unsafe fn config_path<'a>(config: *const c_char) -> Option<&'a Path> {
    if config.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    let config = unsafe { CStr::from_ptr(config) };
    match config.to_str() {
        Ok(config) => Some(Path::new(config)),
        Err(error) => {
            debug!("Ignoring config path that is not UTF-8: {error}");
            None
        }
    }
}

/// Starts the signer for `config`, runs `operation` with its key and stops the signer again.
///
/// Returns [`None`] if the signer can not be started or `operation` fails.
fn with_key<T>(
    config: Option<&Path>,
    operation: impl FnOnce(&Key) -> Result<T, ecp_client::Error>,
) -> Option<T> {
    init_logging_once();
    let key = match cred(config) {
        Ok(key) => key,
        Err(error) => {
            debug!("Could not create client using config {config:?}: {error}");
            return None;
        }
    };
    let result = operation(&key);
    if let Err(error) = key.close() {
        debug!("Failed to clean up key: {error}");
    }
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            error!("Operation on the enterprise certificate key failed: {error}");
            None
        }
    }
}

/// Returns the signing options used by [`Sign`] for `public` and a digest of `digest_len` bytes.
///
/// Returns [`None`] for keys other than RSA and ECDSA keys.
fn sign_opts(public: &PublicKey, digest_len: usize) -> Option<SignerOpts> {
    match public {
        PublicKey::Rsa(_) => Some(SignerOpts::Pss {
            hash: HashAlgorithm::Sha256,
            salt_length: SaltLength::Bytes(digest_len),
        }),
        PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) => Some(HashAlgorithm::Sha256.into()),
        PublicKey::Ed25519(_) => None,
    }
}

/// Returns the key type reported by [`GetKeyType`].
fn key_type_name(public: &PublicKey) -> &'static str {
    match public {
        PublicKey::Rsa(_) | PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) => public.key_type(),
        PublicKey::Ed25519(_) => UNKNOWN_KEY_TYPE,
    }
}

/// Copies `data` to the start of `holder` if it fits.
///
/// Returns whether `data` was copied.
fn copy_to_holder(data: &[u8], holder: &mut [u8]) -> bool {
    let Some(target) = holder.get_mut(..data.len()) else {
        debug!(
            "The holder buffer size {} is smaller than the data size {}",
            holder.len(),
            data.len()
        );
        return false;
    };
    target.copy_from_slice(data);
    true
}

/// Creates a mutable slice for a buffer passed by the caller.
///
/// # Safety
///
/// `holder` must be null or valid for writes of `holder_len` bytes.
unsafe fn holder_slice<'a>(holder: *mut u8, holder_len: usize) -> Option<&'a mut [u8]> {
    if holder.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    Some(unsafe { std::slice::from_raw_parts_mut(holder, holder_len) })
}

/// Returns the version of the library.
///
/// The returned string must be freed with [`FreeString`].
#[unsafe(no_mangle)]
pub extern "C" fn ECPVersion() -> *mut c_char {
    into_c_string(version())
}

/// Frees a string returned by this library.
///
/// # Safety
///
/// `string` must be null or a pointer returned by [`ECPVersion`] or [`GetKeyType`] that has not
/// been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FreeString(string: *mut c_char) {
    if string.is_null() {
        return;
    }
    // SAFETY: guaranteed by the caller.
    drop(unsafe { CString::from_raw(string) });
}

/// Returns the length of the PEM encoded certificate chain and copies it to `holder`.
///
/// The chain is copied only if `holder` is not null and at least as large as the chain.
/// Returns `0` if the chain can not be retrieved.
///
/// # Safety
///
/// - `config` must be null or point to a NUL-terminated string.
/// - `holder` must be null or valid for writes of `holder_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetCertPem(
    config: *const c_char,
    holder: *mut u8,
    holder_len: usize,
) -> usize {
    // SAFETY: guaranteed by the caller.
    let config = unsafe { config_path(config) };
    let Some(pem) = with_key(config, Key::certificate_chain_pem) else {
        return 0;
    };
    // SAFETY: guaranteed by the caller.
    if let Some(holder) = unsafe { holder_slice(holder, holder_len) } {
        copy_to_holder(pem.as_bytes(), holder);
    }
    pem.len()
}

/// Signs a SHA-256 `digest` and copies the signature to `holder`.
///
/// RSA keys sign with RSASSA-PSS and a salt as long as the digest, ECDSA keys produce an ASN.1
/// DER signature.
///
/// Returns the length of the signature. If `holder` is null, only the length is returned.
/// Returns `0` if signing fails or `holder` is too small for the signature.
///
/// # Safety
///
/// - `config` must be null or point to a NUL-terminated string.
/// - `digest` must be valid for reads of `digest_len` bytes.
/// - `holder` must be null or valid for writes of `holder_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sign(
    config: *const c_char,
    digest: *const u8,
    digest_len: usize,
    holder: *mut u8,
    holder_len: usize,
) -> usize {
    if digest.is_null() {
        debug!("No digest to sign");
        return 0;
    }
    // SAFETY: guaranteed by the caller.
    let config = unsafe { config_path(config) };
    // SAFETY: guaranteed by the caller.
    let digest = unsafe { std::slice::from_raw_parts(digest, digest_len) };

    let signature = with_key(config, |key| {
        let Some(opts) = sign_opts(key.public(), digest.len()) else {
            debug!("Unsupported key type {}", key.key_type());
            return Ok(None);
        };
        debug!("The key is a {} key", key.key_type());
        key.sign(digest, Some(&opts)).map(Some)
    })
    .flatten();
    let Some(signature) = signature else {
        return 0;
    };

    // SAFETY: guaranteed by the caller.
    match unsafe { holder_slice(holder, holder_len) } {
        Some(holder) => {
            if copy_to_holder(&signature, holder) {
                signature.len()
            } else {
                0
            }
        }
        None => signature.len(),
    }
}

/// Returns the key type of the configured key: `RSA`, `EC` or `unknown`.
///
/// The returned string must be freed with [`FreeString`].
///
/// # Safety
///
/// `config` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetKeyType(config: *const c_char) -> *mut c_char {
    // SAFETY: guaranteed by the caller.
    let config = unsafe { config_path(config) };
    let key_type = with_key(config, |key| Ok(key_type_name(key.public())));
    into_c_string(key_type.unwrap_or(UNKNOWN_KEY_TYPE))
}

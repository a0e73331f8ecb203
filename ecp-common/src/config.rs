//! The enterprise certificate configuration file and its default locations.
//!
//! The configuration is a JSON document naming the signer binary and the parameters of the
//! keystore backend the signer should use:
//!
//! ```json
//! {
//!   "libs": { "ecp": "/usr/local/bin/ecp-signer" },
//!   "cert_configs": {
//!     "pkcs11": { "slot": "0x1739427", "label": "gecc", "user_pin": "0000", "module": "/usr/lib/pkcs11.so" }
//!   }
//! }
//! ```
//!
//! # Examples
//!
//! ```
//! use ecp_common::config::{get_default_config_file_path, resolve_config_path};
//!
//! // The location used if neither an explicit path nor the environment override is set.
//! println!("{:?}", get_default_config_file_path());
//!
//! // An explicit path always takes precedence.
//! assert_eq!(
//!     resolve_config_path(Some("/tmp/certificate_config.json".as_ref())),
//!     std::path::PathBuf::from("/tmp/certificate_config.json"),
//! );
//! ```

use std::{
    env,
    ffi::OsString,
    fs::File,
    io::BufReader,
    num::ParseIntError,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "GOOGLE_API_CERTIFICATE_CONFIG";

/// The filename of the configuration file.
const CONFIG_FILE: &str = "certificate_config.json";

/// The configuration directory relative to the home directory (or `%APPDATA%` on Windows).
#[cfg(not(windows))]
const CONFIG_DIR: &str = ".config/gcloud";

/// The configuration directory relative to the home directory (or `%APPDATA%` on Windows).
#[cfg(windows)]
const CONFIG_DIR: &str = "gcloud";

/// An error that may occur when handling the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration file does not exist or does not name a signer binary.
    #[error("Config is unavailable")]
    ConfigUnavailable,

    /// An I/O error with a specific path.
    #[error("I/O error at {path} while {context}:\n{source}")]
    IoPath {
        /// The file that was being accessed.
        path: PathBuf,

        /// The short description of the operation.
        ///
        /// This is meant to complete the sentence "I/O error at path while ".
        context: &'static str,

        /// The source error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or does not match the expected structure.
    #[error("Unable to parse config file {path}:\n{source}")]
    Json {
        /// The configuration file.
        path: PathBuf,

        /// The source error.
        source: serde_json::Error,
    },

    /// A PKCS#11 slot identifier is not a hexadecimal `u32`.
    #[error("Invalid PKCS#11 slot {slot:?}: {source}")]
    InvalidSlot {
        /// The slot as found in the configuration.
        slot: String,

        /// The source error.
        source: ParseIntError,
    },
}

impl Error {
    /// Returns whether this is the [`Error::ConfigUnavailable`] sentinel.
    ///
    /// Callers may use this to fall back to behavior not requiring a client certificate.
    pub fn is_config_unavailable(&self) -> bool {
        matches!(self, Self::ConfigUnavailable)
    }
}

/// Locations of helper binaries and libraries.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Libs {
    /// The signer binary.
    #[serde(default)]
    pub ecp: String,

    /// The shared library exposing the foreign function interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecp_client: Option<String>,

    /// A TLS offload library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_offload: Option<String>,
}

/// Parameters for the macOS Keychain backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MacOsKeychain {
    /// The common name of the issuer of the certificate to use.
    pub issuer: String,
}

/// Parameters for the Windows certificate store backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct WindowsStore {
    /// The common name of the issuer of the certificate to use.
    pub issuer: String,

    /// The certificate store (e.g. `MY`).
    pub store: String,

    /// The key storage provider (e.g. `current_user` or `local_machine`).
    pub provider: String,
}

/// Parameters for the PKCS#11 backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pkcs11 {
    /// The hexadecimal representation of the slot ID (e.g. `0x1739427`).
    pub slot: String,

    /// The token label.
    pub label: String,

    /// The PIN of the token user.
    #[serde(default)]
    pub user_pin: String,

    /// The path to the PKCS#11 module (a shared library).
    pub module: String,
}

impl Pkcs11 {
    /// Returns the slot ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is not a hexadecimal `u32`, with an optional `0x` prefix.
    pub fn slot_id(&self) -> Result<u32, Error> {
        parse_hex_u32(&self.slot)
    }
}

/// Parameters for the software backend, which reads a PEM encoded certificate chain and key.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Software {
    /// A PEM file containing the certificate chain, leaf first.
    pub cert_chain: PathBuf,

    /// A PEM file containing the private key matching the leaf certificate.
    pub private_key: PathBuf,
}

/// Keystore backend configurations.
///
/// The signer uses the first configured backend, in the order of the fields.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CertConfigs {
    /// The software backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software: Option<Software>,

    /// The PKCS#11 backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkcs11: Option<Pkcs11>,

    /// The macOS Keychain backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macos_keychain: Option<MacOsKeychain>,

    /// The Windows certificate store backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_store: Option<WindowsStore>,
}

/// The enterprise certificate configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CertificateConfig {
    /// Helper binary and library locations.
    #[serde(default)]
    pub libs: Libs,

    /// Keystore backend configurations.
    #[serde(default)]
    pub cert_configs: CertConfigs,
}

impl CertificateConfig {
    /// Reads a [`CertificateConfig`] from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if
    ///
    /// - the file does not exist ([`Error::ConfigUnavailable`]),
    /// - the file can not be opened,
    /// - or the file contents are not a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!("Reading enterprise certificate config {path:?}");
        let file = File::open(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigUnavailable
            } else {
                Error::IoPath {
                    path: path.to_path_buf(),
                    context: "opening the config file",
                    source,
                }
            }
        })?;

        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the signer binary, with a home directory prefix expanded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigUnavailable`] if
    ///
    /// - no signer binary is set,
    /// - or the signer binary is relative to the home directory, which can not be determined.
    pub fn signer_binary_path(&self) -> Result<PathBuf, Error> {
        if self.libs.ecp.is_empty() {
            return Err(Error::ConfigUnavailable);
        }
        expand_home(&self.libs.ecp, home_dir())
    }
}

/// Returns the path of the signer binary configured in the file at `config_path`.
///
/// # Errors
///
/// Returns an error if
///
/// - the file does not exist or names no signer binary ([`Error::ConfigUnavailable`]),
/// - the file can not be read,
/// - or the file contents are malformed.
pub fn load_signer_binary_path(config_path: impl AsRef<Path>) -> Result<PathBuf, Error> {
    CertificateConfig::from_file(config_path)?.signer_binary_path()
}

/// Replaces a leading `~`, `$HOME` or `HOME` in `path` with the `home` directory.
///
/// # Errors
///
/// Returns [`Error::ConfigUnavailable`] if `path` refers to the home directory but `home` is
/// [`None`].
fn expand_home(path: &str, home: Option<PathBuf>) -> Result<PathBuf, Error> {
    let Some(rest) = ["~", "$HOME", "HOME"]
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))
    else {
        return Ok(PathBuf::from(path));
    };
    let home = home.ok_or(Error::ConfigUnavailable)?;
    let mut expanded = home.into_os_string();
    expanded.push(rest);
    Ok(PathBuf::from(expanded))
}

/// Returns the home directory of the current user.
///
/// Prefers the `HOME` environment variable and falls back to the user database.
pub fn home_dir() -> Option<PathBuf> {
    if let Some(home) = env::var_os("HOME").filter(|home| !home.is_empty()) {
        return Some(PathBuf::from(home));
    }
    user_db_home_dir()
}

#[cfg(unix)]
fn user_db_home_dir() -> Option<PathBuf> {
    use nix::unistd::{Uid, User};

    User::from_uid(Uid::current())
        .ok()
        .flatten()
        .map(|user| user.dir)
}

#[cfg(not(unix))]
fn user_db_home_dir() -> Option<PathBuf> {
    env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the directory containing the default configuration file.
#[cfg(windows)]
pub fn get_default_config_dir_path() -> PathBuf {
    PathBuf::from(env::var_os("APPDATA").unwrap_or_default()).join(CONFIG_DIR)
}

/// Returns the directory containing the default configuration file.
#[cfg(not(windows))]
pub fn get_default_config_dir_path() -> PathBuf {
    home_dir().unwrap_or_default().join(CONFIG_DIR)
}

/// Returns the file path of the default configuration file.
pub fn get_default_config_file_path() -> PathBuf {
    get_default_config_dir_path().join(CONFIG_FILE)
}

/// Returns the configuration file path to use.
///
/// Considers in descending priority:
/// - `explicit`, unless it is [`None`] or empty,
/// - the [`CONFIG_ENV`] environment variable, unless it is unset or empty,
/// - the default location (see [`get_default_config_file_path`]).
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    resolve_config_path_with(explicit, env::var_os(CONFIG_ENV))
}

/// Returns the configuration file path to use, with the environment override passed in.
fn resolve_config_path_with(explicit: Option<&Path>, env_override: Option<OsString>) -> PathBuf {
    if let Some(explicit) = explicit.filter(|path| !path.as_os_str().is_empty()) {
        return explicit.to_path_buf();
    }
    if let Some(env_override) = env_override.filter(|path| !path.is_empty()) {
        return PathBuf::from(env_override);
    }
    get_default_config_file_path()
}

/// Parses a hexadecimal string with an optional `0x` prefix into a `u32`.
///
/// # Errors
///
/// Returns an error if `input` is not a valid hexadecimal `u32`.
pub fn parse_hex_u32(input: &str) -> Result<u32, Error> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    u32::from_str_radix(digits, 16).map_err(|source| Error::InvalidSlot {
        slot: input.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use rstest::rstest;
    use tempfile::tempdir;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn missing_file_is_unavailable() -> TestResult {
        let dir = tempdir()?;
        let result = load_signer_binary_path(dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::ConfigUnavailable)));
        Ok(())
    }

    #[rstest]
    #[case(r#"{"libs": {}}"#)]
    #[case(r#"{"libs": {"ecp": ""}}"#)]
    #[case(r#"{}"#)]
    fn missing_signer_path_is_unavailable(#[case] contents: &str) -> TestResult {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        write(&path, contents)?;
        let result = load_signer_binary_path(&path);
        assert!(result.is_err_and(|error| error.is_config_unavailable()));
        Ok(())
    }

    #[test]
    fn malformed_file_is_not_unavailable() -> TestResult {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        write(&path, r#"{"libs": {"ecp": "#)?;
        let result = load_signer_binary_path(&path);
        assert!(matches!(result, Err(Error::Json { .. })));
        Ok(())
    }

    #[test]
    fn full_config_is_parsed() -> TestResult {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        write(
            &path,
            r#"{
  "libs": {
    "ecp": "/usr/local/bin/ecp-signer",
    "ecp_client": "/usr/local/lib/libecp.so",
    "tls_offload": "/usr/local/lib/libtls_offload.so"
  },
  "cert_configs": {
    "pkcs11": {
      "slot": "0x1739427",
      "label": "gecc",
      "user_pin": "0000",
      "module": "/usr/lib/softhsm/libsofthsm2.so"
    },
    "windows_store": {
      "issuer": "enterprise_v1_corp_client",
      "store": "MY",
      "provider": "current_user"
    },
    "unknown_backend": {}
  }
}"#,
        )?;

        let config = CertificateConfig::from_file(&path)?;
        assert_eq!(
            config.signer_binary_path()?,
            PathBuf::from("/usr/local/bin/ecp-signer")
        );
        let pkcs11 = config.cert_configs.pkcs11.ok_or("pkcs11 section missing")?;
        assert_eq!(pkcs11.slot_id()?, 0x1739427);
        assert_eq!(pkcs11.label, "gecc");
        assert!(config.cert_configs.macos_keychain.is_none());
        assert_eq!(
            config.cert_configs.windows_store.map(|store| store.store),
            Some("MY".to_string())
        );
        Ok(())
    }

    #[rstest]
    #[case("~/bin/ecp", "/home/user/bin/ecp")]
    #[case("$HOME/bin/ecp", "/home/user/bin/ecp")]
    #[case("HOME/bin/ecp", "/home/user/bin/ecp")]
    #[case("/opt/ecp/ecp", "/opt/ecp/ecp")]
    fn home_prefix_is_expanded(#[case] input: &str, #[case] expected: &str) -> TestResult {
        assert_eq!(
            expand_home(input, Some(PathBuf::from("/home/user")))?,
            PathBuf::from(expected)
        );
        Ok(())
    }

    #[test]
    fn home_prefix_without_home_is_unavailable() {
        assert!(matches!(
            expand_home("~/bin/ecp", None),
            Err(Error::ConfigUnavailable)
        ));
    }

    #[rstest]
    #[case(Some("/explicit.json"), Some("/env.json"), "/explicit.json")]
    #[case(Some(""), Some("/env.json"), "/env.json")]
    #[case(None, Some("/env.json"), "/env.json")]
    fn config_path_precedence(
        #[case] explicit: Option<&str>,
        #[case] env_override: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(
            resolve_config_path_with(explicit.map(Path::new), env_override.map(OsString::from)),
            PathBuf::from(expected)
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    fn config_path_falls_back_to_default(#[case] env_override: Option<&str>) {
        assert_eq!(
            resolve_config_path_with(None, env_override.map(OsString::from)),
            get_default_config_file_path()
        );
    }

    #[rstest]
    #[case("0x1739427", Some(0x1739427))]
    #[case("1739427", Some(0x1739427))]
    #[case("0XFF", Some(0xff))]
    #[case("0xzz", None)]
    #[case("0x100000000", None)]
    fn hex_slots(#[case] input: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_hex_u32(input).ok(), expected);
    }
}

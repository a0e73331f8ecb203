//! Logging utilities.
//!
//! All diagnostic output is suppressed unless [`LOGGING_ENV`] is set to a non-empty value.
//! If it is, leveled log messages are written to stderr.

use std::{
    env,
    ffi::OsStr,
    sync::Once,
};

use log::LevelFilter;
use simplelog::{ColorChoice, TermLogger, TerminalMode};

/// Environment variable which enables logging when set to a non-empty value.
pub const LOGGING_ENV: &str = "ENABLE_ENTERPRISE_CERTIFICATE_LOGS";

/// Logging setup error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Logger initialization error.
    #[error("Logger initialization error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

/// Returns the maximum log level for a value of the [`LOGGING_ENV`] environment variable.
///
/// An unset or empty `value` disables logging altogether.
pub fn level_for(value: Option<&OsStr>) -> LevelFilter {
    match value {
        Some(value) if !value.is_empty() => LevelFilter::Debug,
        _ => LevelFilter::Off,
    }
}

/// Returns the maximum log level derived from the process environment.
pub fn level_from_env() -> LevelFilter {
    level_for(env::var_os(LOGGING_ENV).as_deref())
}

/// Returns whether logging is enabled in the process environment.
pub fn logging_enabled() -> bool {
    level_from_env() != LevelFilter::Off
}

/// Sets up logging facilities.
///
/// A `max_level` of [`LevelFilter::Off`] does not install a logger, it only silences the [`log`]
/// facade.
///
/// # Errors
///
/// An error is returned if a logger has already been set.
pub fn setup_logging(max_level: impl Into<LevelFilter>) -> Result<(), Error> {
    let max_level = max_level.into();
    if max_level == LevelFilter::Off {
        log::set_max_level(max_level);
        return Ok(());
    }
    TermLogger::init(
        max_level,
        Default::default(),
        // simplelog needs to be explicitly instructed to always use stderr
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}

/// Sets up logging facilities according to the [`LOGGING_ENV`] environment variable.
///
/// # Errors
///
/// An error is returned if a logger has already been set.
pub fn setup_logging_from_env() -> Result<(), Error> {
    setup_logging(level_from_env())
}

/// Sets up logging from the environment exactly once per process.
///
/// Meant for library entry points, which can not know whether they are called first.
/// Failing to install a logger is reported on stderr, but only if logging has been requested.
pub fn init_logging_once() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Err(error) = setup_logging_from_env() {
            if logging_enabled() {
                eprintln!("{error}");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, LevelFilter::Off)]
    #[case(Some(""), LevelFilter::Off)]
    #[case(Some("1"), LevelFilter::Debug)]
    #[case(Some("false"), LevelFilter::Debug)]
    fn level_follows_env_value(#[case] value: Option<&str>, #[case] expected: LevelFilter) {
        assert_eq!(level_for(value.map(OsStr::new)), expected);
    }
}

//! Termination of the signer once its parent process is gone.
//!
//! When the client dies without closing the signer, the signer is re-parented (to init or a
//! subreaper). A background thread polls the parent process ID and exits the process as soon as
//! it differs from the one observed at startup or is the one of init.

use std::time::Duration;

/// The interval at which the parent process ID is polled.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The name of the watchdog thread.
pub const THREAD_NAME: &str = "parent-watchdog";

/// The process ID of init, which adopts orphaned processes.
const INIT_PID: i32 = 1;

/// Returns whether the parent process, observed as `initial` at startup, is gone.
///
/// This is the case once the process has been re-parented, or whenever its parent is init.
pub fn parent_is_gone(initial: i32, current: i32) -> bool {
    current != initial || current == INIT_PID
}

/// Starts the watchdog thread.
///
/// The thread is detached and runs for the lifetime of the process.
///
/// # Errors
///
/// Returns an error if the thread can not be spawned.
#[cfg(unix)]
pub fn spawn() -> Result<(), crate::Error> {
    use log::{debug, error};
    use nix::unistd::getppid;

    let initial = getppid().as_raw();
    debug!("Watching parent process {initial}");
    std::thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            loop {
                std::thread::sleep(POLL_INTERVAL);
                let current = getppid().as_raw();
                if parent_is_gone(initial, current) {
                    error!(
                        "Parent process {initial} is gone (now re-parented to {current}), exiting..."
                    );
                    std::process::exit(1);
                }
            }
        })
        .map_err(|source| crate::Error::Io {
            context: "spawning the parent watchdog",
            source,
        })?;
    Ok(())
}

/// Starts the watchdog thread.
///
/// Parent process tracking is only available on Unix, elsewhere no thread is started.
///
/// # Errors
///
/// Never returns an error.
#[cfg(not(unix))]
pub fn spawn() -> Result<(), crate::Error> {
    log::debug!("Parent process tracking is not available on this platform");
    Ok(())
}

//! Tests of the client against the mock signer running as a subprocess.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use ecp_client::{Error, HashAlgorithm, SignerOpts, cred};
use ecp_common::config::{CertConfigs, CertificateConfig};
use ecp_tests::fixture::{certificate_contains_public_key, signer_config, write_config};
use tempfile::{TempDir, tempdir};
use testresult::TestResult;

const MOCK_SIGNER: &str = env!("CARGO_BIN_EXE_ecp-mock-signer");

/// Writes a configuration naming the mock signer to a temporary directory.
fn mock_config() -> TestResult<(TempDir, PathBuf)> {
    let dir = tempdir()?;
    let path = write_config(
        dir.path(),
        &signer_config(Path::new(MOCK_SIGNER), CertConfigs::default()),
    )?;
    Ok((dir, path))
}

#[test]
fn cred_starts_and_closes_the_signer() -> TestResult {
    let (_dir, config) = mock_config()?;

    let key = cred(Some(&config))?;

    assert_eq!(key.key_type(), "EC");
    key.close()?;
    Ok(())
}

#[test]
fn missing_config_is_unavailable() -> TestResult {
    let dir = tempdir()?;

    let error = cred(Some(&dir.path().join("missing.json")))
        .err()
        .ok_or("a missing config file was accepted")?;

    assert!(error.is_config_unavailable());
    Ok(())
}

#[test]
fn config_without_signer_is_unavailable() -> TestResult {
    let dir = tempdir()?;
    let config = write_config(dir.path(), &CertificateConfig::default())?;

    let error = cred(Some(&config))
        .err()
        .ok_or("a config without a signer was accepted")?;

    assert!(error.is_config_unavailable());
    Ok(())
}

#[test]
fn malformed_config_is_an_error() -> TestResult {
    let dir = tempdir()?;
    let config = dir.path().join("certificate_config.json");
    File::create(&config)?.write_all(b"{\"libs\": ")?;

    let error = cred(Some(&config))
        .err()
        .ok_or("a malformed config was accepted")?;

    assert!(matches!(error, Error::Config(_)));
    assert!(!error.is_config_unavailable());
    Ok(())
}

#[test]
fn missing_signer_binary_fails_to_spawn() -> TestResult {
    let dir = tempdir()?;
    let config = write_config(
        dir.path(),
        &signer_config(&dir.path().join("no-such-signer"), CertConfigs::default()),
    )?;

    let error = cred(Some(&config))
        .err()
        .ok_or("a missing signer binary was started")?;

    assert!(matches!(error, Error::Spawn { .. }));
    assert!(!error.is_config_unavailable());
    Ok(())
}

#[test]
fn certificate_chain_embeds_public_key() -> TestResult {
    let (_dir, config) = mock_config()?;
    let key = cred(Some(&config))?;

    let chain = key.certificate_chain();

    assert!(!chain.is_empty());
    assert!(certificate_contains_public_key(&chain[0], key.public_key_der()));
    let pem = key.certificate_chain_pem()?;
    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
    assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
    key.close()?;
    Ok(())
}

#[test]
fn unhashed_digest_is_echoed() -> TestResult {
    let (_dir, config) = mock_config()?;
    let key = cred(Some(&config))?;

    assert_eq!(key.sign(b"testDigest", None)?, b"testDigest");
    key.close()?;
    Ok(())
}

#[test]
fn digest_length_mismatch_is_reported() -> TestResult {
    let (_dir, config) = mock_config()?;
    let key = cred(Some(&config))?;

    let error = key
        .sign(b"testDigest", Some(&SignerOpts::from(HashAlgorithm::Sha256)))
        .err()
        .ok_or("signing a short digest succeeded")?;

    assert_eq!(
        error.remote_message(),
        Some("Digest length of 10 bytes does not match Hash function size of 32 bytes")
    );
    key.close()?;
    Ok(())
}

#[test]
fn encryption_round_trip() -> TestResult {
    let (_dir, config) = mock_config()?;
    let key = cred(Some(&config))?;

    let ciphertext = key.encrypt(b"plaintext")?;

    assert_ne!(ciphertext, b"plaintext");
    assert_eq!(key.decrypt(&ciphertext)?, b"plaintext");
    key.close()?;
    Ok(())
}

/// Returns whether a process with `pid` exists, including unreaped zombies.
#[cfg(unix)]
fn process_exists(pid: u32) -> TestResult<bool> {
    Ok(std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()?
        .success())
}

#[cfg(unix)]
#[test]
fn close_reaps_the_signer() -> TestResult {
    let (_dir, config) = mock_config()?;
    let key = cred(Some(&config))?;
    let pid = key.process_id().ok_or("the signer has no process ID")?;
    assert!(process_exists(pid)?);

    key.close()?;

    assert!(!process_exists(pid)?);
    Ok(())
}

#[cfg(unix)]
#[test]
fn signer_exiting_early_fails_calls_but_not_close() -> TestResult {
    let (_dir, config) = mock_config()?;
    let key = cred(Some(&config))?;
    let pid = key.process_id().ok_or("the signer has no process ID")?;
    assert!(
        std::process::Command::new("kill")
            .args(["-9", &pid.to_string()])
            .status()?
            .success()
    );

    let error = key
        .sign(b"testDigest", None)
        .err()
        .ok_or("signing with a dead signer succeeded")?;
    assert!(matches!(error, Error::Rpc { operation: "Sign", .. }));

    // the outcome of closing depends on the platform, but the process is reaped either way
    let _closed = key.close();
    assert!(!process_exists(pid)?);
    Ok(())
}

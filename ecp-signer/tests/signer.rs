//! Integration tests running the signer binary with the software keystore backend.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use ecp_client::{HashAlgorithm, Key, PublicKey, SaltLength, SignerOpts, cred};
use ecp_common::config::{CertConfigs, Pkcs11};
use ecp_tests::fixture::{
    KeyAlgorithm,
    SoftwareKey,
    certificate_contains_public_key,
    signer_config,
    write_config,
    write_software_key,
};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::{Pkcs1v15Sign, Pss};
use rstest::rstest;
use sha2::{Digest, Sha256, Sha384};
use tempfile::{TempDir, tempdir};
use testresult::TestResult;

const SIGNER: &str = env!("CARGO_BIN_EXE_ecp-signer");

/// Writes a key of `algorithm` and a configuration using it to a temporary directory.
fn software_config(algorithm: KeyAlgorithm) -> TestResult<(TempDir, SoftwareKey, PathBuf)> {
    let dir = tempdir()?;
    let key = write_software_key(dir.path(), algorithm)?;
    let config = signer_config(
        Path::new(SIGNER),
        CertConfigs {
            software: Some(key.cert_config()),
            ..Default::default()
        },
    );
    let path = write_config(dir.path(), &config)?;
    Ok((dir, key, path))
}

#[rstest]
#[case(KeyAlgorithm::Rsa, "RSA")]
#[case(KeyAlgorithm::P256, "EC")]
#[case(KeyAlgorithm::P384, "EC")]
fn certificate_chain_and_public_key_match(
    #[case] algorithm: KeyAlgorithm,
    #[case] key_type: &str,
) -> TestResult {
    let (_dir, software_key, config) = software_config(algorithm)?;

    let key = cred(Some(&config))?;

    assert_eq!(key.certificate_chain(), [software_key.certificate_der.clone()]);
    assert!(certificate_contains_public_key(
        &key.certificate_chain()[0],
        key.public_key_der()
    ));
    assert_eq!(key.key_type(), key_type);
    assert!(
        key.certificate_chain_pem()?
            .starts_with("-----BEGIN CERTIFICATE-----\n")
    );
    key.close()?;
    Ok(())
}

#[rstest]
#[case(SignerOpts::Hash { hash: HashAlgorithm::Sha256 }, Pkcs1v15Sign::new::<Sha256>())]
#[case(SignerOpts::pss(HashAlgorithm::Sha256), Pss::new_with_salt::<Sha256>(32))]
#[case(
    SignerOpts::Pss { hash: HashAlgorithm::Sha256, salt_length: SaltLength::Bytes(16) },
    Pss::new_with_salt::<Sha256>(16)
)]
fn rsa_signatures_verify(
    #[case] opts: SignerOpts,
    #[case] scheme: impl rsa::traits::SignatureScheme,
) -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::Rsa)?;
    let key = cred(Some(&config))?;
    let digest = Sha256::digest(b"message");

    let signature = key.sign(&digest, Some(&opts))?;

    let PublicKey::Rsa(public) = key.public() else {
        return Err("not an RSA key".into());
    };
    public.verify(scheme, &digest, &signature)?;
    key.close()?;
    Ok(())
}

#[test]
fn ecdsa_signatures_verify() -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::P384)?;
    let key = cred(Some(&config))?;
    let digest = Sha384::digest(b"message");

    let signature = key.sign(&digest, Some(&SignerOpts::from(HashAlgorithm::Sha384)))?;

    let PublicKey::EcdsaP384(public) = key.public() else {
        return Err("not a P-384 key".into());
    };
    p384::ecdsa::VerifyingKey::from(public)
        .verify_prehash(&digest, &p384::ecdsa::Signature::from_der(&signature)?)?;
    key.close()?;
    Ok(())
}

#[test]
fn p256_signatures_verify() -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::P256)?;
    let key = cred(Some(&config))?;
    let digest = Sha256::digest(b"message");

    let signature = key.sign(&digest, Some(&SignerOpts::from(HashAlgorithm::Sha256)))?;

    let PublicKey::EcdsaP256(public) = key.public() else {
        return Err("not a P-256 key".into());
    };
    p256::ecdsa::VerifyingKey::from(public)
        .verify_prehash(&digest, &p256::ecdsa::Signature::from_der(&signature)?)?;
    key.close()?;
    Ok(())
}

#[test]
fn digest_length_mismatch_is_reported() -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::Rsa)?;
    let key = cred(Some(&config))?;

    let error = key
        .sign(b"testDigest", Some(&SignerOpts::from(HashAlgorithm::Sha256)))
        .err()
        .ok_or("signing a short digest succeeded")?;

    assert_eq!(
        error.remote_message(),
        Some("Digest length of 10 bytes does not match Hash function size of 32 bytes")
    );
    // The signer keeps serving after a failed call.
    assert!(!key.sign(&Sha256::digest(b"message"), None)?.is_empty());
    key.close()?;
    Ok(())
}

#[test]
fn rsa_encryption_round_trip() -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::Rsa)?;
    let key = cred(Some(&config))?;

    let ciphertext = key.encrypt(b"plaintext")?;
    assert_ne!(ciphertext, b"plaintext");
    assert_eq!(key.decrypt(&ciphertext)?, b"plaintext");

    let ciphertext = key.encrypt_with_hash(b"plaintext", HashAlgorithm::Sha384)?;
    assert_eq!(key.decrypt_with_hash(&ciphertext, HashAlgorithm::Sha384)?, b"plaintext");
    key.close()?;
    Ok(())
}

#[test]
fn ecdsa_keys_do_not_encrypt() -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::P256)?;
    let key = cred(Some(&config))?;

    let error = key
        .encrypt(b"plaintext")
        .err()
        .ok_or("encrypting with an ECDSA key succeeded")?;

    assert_eq!(
        error.remote_message(),
        Some("The key does not support Encrypt")
    );
    key.close()?;
    Ok(())
}

#[test]
fn keys_can_be_shared_between_threads() -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::P256)?;
    let key = cred(Some(&config))?;
    let digest = Sha256::digest(b"message");
    let opts = SignerOpts::from(HashAlgorithm::Sha256);

    std::thread::scope(|scope| -> TestResult {
        let (key, digest, opts) = (&key, &digest, &opts);
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || key.sign(digest, Some(opts))))
            .collect();
        for handle in handles {
            let signature = handle.join().map_err(|_| "signing thread panicked")??;
            assert!(!signature.is_empty());
        }
        Ok(())
    })?;
    key.close()?;
    Ok(())
}

#[test]
fn unavailable_backend_fails_at_startup() -> TestResult {
    let dir = tempdir()?;
    let config = signer_config(
        Path::new(SIGNER),
        CertConfigs {
            pkcs11: Some(Pkcs11 {
                slot: "0x1739427".to_string(),
                label: "testLabel".to_string(),
                user_pin: "0000".to_string(),
                module: "/usr/lib/softhsm/libsofthsm2.so".to_string(),
            }),
            ..Default::default()
        },
    );
    let path = write_config(dir.path(), &config)?;

    let error = Key::spawn(Path::new(SIGNER), &path)
        .err()
        .ok_or("starting a signer without a usable backend succeeded")?;

    assert!(matches!(
        error,
        ecp_client::Error::Rpc {
            operation: "CertificateChain",
            ..
        }
    ));
    Ok(())
}

#[test]
fn manual_invocation_fails() -> TestResult {
    let output = Command::new(SIGNER).output()?;

    assert!(!output.status.success());
    Ok(())
}

#[test]
fn oversized_salt_fails_only_the_call() -> TestResult {
    let (_dir, _software_key, config) = software_config(KeyAlgorithm::Rsa)?;
    let key = cred(Some(&config))?;
    let digest = Sha256::digest(b"message");
    let opts = SignerOpts::Pss {
        hash: HashAlgorithm::Sha256,
        salt_length: SaltLength::Bytes(1 << 40),
    };

    let error = key
        .sign(&digest, Some(&opts))
        .err()
        .ok_or("signing with an oversized salt succeeded")?;

    assert_eq!(
        error.remote_message(),
        Some("Salt length of 1099511627776 bytes exceeds the maximum of 222 bytes for this key")
    );
    assert!(!key.sign(&digest, Some(&SignerOpts::pss(HashAlgorithm::Sha256)))?.is_empty());
    key.close()?;
    Ok(())
}

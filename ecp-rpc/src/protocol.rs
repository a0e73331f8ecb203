//! Messages exchanged between a client and a signer.
//!
//! Every call is a [`Request`] answered by exactly one [`Response`] with the same id.
//! Byte buffers are transmitted as base64 strings.
//!
//! Signing options are a closed set ([`SignerOpts`]), so both ends agree on every concrete option
//! type at compile time and an option value always decodes back into the same variant.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u32 = 1;

/// A hash algorithm identifier.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgorithm {
    /// Returns the size of a digest created by this hash algorithm in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        })
    }
}

/// The salt length of an RSASSA-PSS signature.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "kind", content = "bytes", rename_all = "snake_case")]
pub enum SaltLength {
    /// The largest salt length the key size permits.
    #[default]
    Auto,

    /// A salt as long as the digest.
    EqualsHash,

    /// An explicit salt length in bytes.
    Bytes(usize),
}

/// Options for a signing operation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignerOpts {
    /// Only a hash algorithm.
    ///
    /// RSA keys create PKCS#1 v1.5 signatures with these options.
    Hash {
        /// The hash algorithm used to create the digest.
        hash: HashAlgorithm,
    },

    /// RSASSA-PSS parameters.
    Pss {
        /// The hash algorithm used to create the digest and for the mask generation function.
        hash: HashAlgorithm,

        /// The salt length.
        salt_length: SaltLength,
    },
}

impl SignerOpts {
    /// Returns the hash algorithm of the options.
    pub fn hash(&self) -> HashAlgorithm {
        match self {
            Self::Hash { hash } | Self::Pss { hash, .. } => *hash,
        }
    }

    /// Creates RSASSA-PSS options with a salt as long as the digest.
    pub fn pss(hash: HashAlgorithm) -> Self {
        Self::Pss {
            hash,
            salt_length: SaltLength::EqualsHash,
        }
    }
}

impl From<HashAlgorithm> for SignerOpts {
    fn from(hash: HashAlgorithm) -> Self {
        Self::Hash { hash }
    }
}

/// Arguments of a [`Call::Sign`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SignArgs {
    /// The digest to sign.
    #[serde(with = "base64_bytes")]
    pub digest: Vec<u8>,

    /// The hash algorithm used to create the digest.
    ///
    /// Only considered if `opts` is [`None`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<HashAlgorithm>,

    /// The signing options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<SignerOpts>,
}

impl SignArgs {
    /// Creates new [`SignArgs`], deriving the hash algorithm from `opts`.
    pub fn new(digest: impl Into<Vec<u8>>, opts: Option<SignerOpts>) -> Self {
        Self {
            digest: digest.into(),
            hash: opts.as_ref().map(SignerOpts::hash),
            opts,
        }
    }

    /// Returns the options a signer has to use.
    ///
    /// `opts` takes precedence. The bare `hash` is only used if no `opts` are set.
    pub fn effective_opts(&self) -> Option<SignerOpts> {
        self.opts.or(self.hash.map(SignerOpts::from))
    }
}

/// Arguments of a [`Call::Encrypt`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EncryptArgs {
    /// The data to encrypt.
    #[serde(with = "base64_bytes")]
    pub plaintext: Vec<u8>,

    /// The hash algorithm used for OAEP padding.
    pub hash: HashAlgorithm,
}

/// Arguments of a [`Call::Decrypt`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DecryptArgs {
    /// The data to decrypt.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    /// The hash algorithm used for OAEP padding.
    pub hash: HashAlgorithm,
}

/// A remote procedure call.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Call {
    /// Returns the DER encoded certificate chain, leaf first.
    CertificateChain,

    /// Returns the DER encoded public key (SubjectPublicKeyInfo).
    Public,

    /// Signs a digest.
    Sign(SignArgs),

    /// Encrypts data with the public key.
    Encrypt(EncryptArgs),

    /// Decrypts data with the private key.
    Decrypt(DecryptArgs),
}

impl Call {
    /// Returns the name of the call.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CertificateChain => "CertificateChain",
            Self::Public => "Public",
            Self::Sign(_) => "Sign",
            Self::Encrypt(_) => "Encrypt",
            Self::Decrypt(_) => "Decrypt",
        }
    }
}

/// The result of a successful [`Call`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Reply {
    /// The DER encoded certificate chain, leaf first.
    CertificateChain(#[serde(with = "base64_list")] Vec<Vec<u8>>),

    /// The DER encoded public key.
    Public(#[serde(with = "base64_bytes")] Vec<u8>),

    /// A signature.
    Signature(#[serde(with = "base64_bytes")] Vec<u8>),

    /// Encrypted data.
    Ciphertext(#[serde(with = "base64_bytes")] Vec<u8>),

    /// Decrypted data.
    Plaintext(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Reply {
    /// Returns the name of the reply.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CertificateChain(_) => "CertificateChain",
            Self::Public(_) => "Public",
            Self::Signature(_) => "Signature",
            Self::Ciphertext(_) => "Ciphertext",
            Self::Plaintext(_) => "Plaintext",
        }
    }
}

/// A request sent to a signer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Request {
    /// The id correlating the request with its [`Response`].
    pub id: u64,

    /// The protocol version spoken by the client.
    pub version: u32,

    /// The call to execute.
    pub call: Call,
}

impl Request {
    /// Creates a new [`Request`] for the current [`PROTOCOL_VERSION`].
    pub fn new(id: u64, call: Call) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION,
            call,
        }
    }
}

/// A response sent by a signer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Response {
    /// The id of the [`Request`] this response answers.
    pub id: u64,

    /// The result of a successful call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Reply>,

    /// The error message of a failed call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Creates a successful [`Response`].
    pub fn ok(id: u64, reply: Reply) -> Self {
        Self {
            id,
            result: Some(reply),
            error: None,
        }
    }

    /// Creates a failed [`Response`].
    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Returns the [`Reply`] of the response.
    ///
    /// # Errors
    ///
    /// Returns an error if
    ///
    /// - the response carries an error message ([`crate::Error::Remote`]),
    /// - or the response carries neither a result nor an error.
    pub fn into_result(self) -> Result<Reply, crate::Error> {
        match (self.result, self.error) {
            (_, Some(message)) => Err(crate::Error::Remote(message)),
            (Some(reply), None) => Ok(reply),
            (None, None) => Err(crate::Error::EmptyResponse { id: self.id }),
        }
    }
}

/// Serializes byte buffers as base64 strings.
mod base64_bytes {
    use base64ct::{Base64, Encoding as _};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Base64::decode_vec(&encoded).map_err(D::Error::custom)
    }
}

/// Serializes lists of byte buffers as lists of base64 strings.
mod base64_list {
    use base64ct::{Base64, Encoding as _};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(list: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(list.iter().map(|bytes| Base64::encode_string(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|encoded| Base64::decode_vec(encoded).map_err(D::Error::custom))
            .collect()
    }
}

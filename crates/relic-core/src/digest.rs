//! Algorithm-prefixed content digests.
//!
//! Digests are the primary identity of every artifact in the registry. The
//! wire form is `<algorithm>:<hex>` (e.g. `sha256:ab12…`); the type carries
//! the string as read and validates it at the boundaries where untrusted
//! input enters the system.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};

use crate::error::{Error, Result};

/// A content digest in `<algorithm>:<hex>` form.
///
/// Deserialization is transparent and does not validate (manifests may carry
/// partially-filled descriptors, e.g. link edges still missing a target).
/// Call [`Digest::parse`] or [`Digest::validate`] wherever a digest crosses
/// a trust boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Digest(String);

/// Hash algorithms accepted in digest strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// SHA-256 (64 hex characters).
    Sha256,
    /// SHA-512 (128 hex characters).
    Sha512,
}

impl Algorithm {
    fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl Digest {
    /// Parses and validates a digest string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigest`] when the input is not
    /// `<algorithm>:<hex>` with a supported algorithm and well-formed hex of
    /// the expected length.
    pub fn parse(input: impl Into<String>) -> Result<Self> {
        let digest = Self(input.into());
        digest.validate()?;
        Ok(digest)
    }

    /// Computes the SHA-256 digest of a payload.
    #[must_use]
    pub fn from_bytes(payload: &[u8]) -> Self {
        Self(format!("sha256:{}", hex::encode(Sha256::digest(payload))))
    }

    /// Validates the digest string in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigest`] when the string is malformed.
    pub fn validate(&self) -> Result<()> {
        self.algorithm()?;
        Ok(())
    }

    /// Returns the digest's algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigest`] when the string is malformed or the
    /// algorithm is unsupported.
    pub fn algorithm(&self) -> Result<Algorithm> {
        let Some((algorithm, encoded)) = self.0.split_once(':') else {
            return Err(Error::invalid_digest(&self.0, "missing ':' separator"));
        };
        let algorithm = match algorithm {
            "sha256" => Algorithm::Sha256,
            "sha512" => Algorithm::Sha512,
            other => {
                return Err(Error::invalid_digest(
                    &self.0,
                    format!("unsupported algorithm {other:?}"),
                ));
            }
        };
        if encoded.len() != algorithm.hex_len() {
            return Err(Error::invalid_digest(
                &self.0,
                format!(
                    "expected {} hex characters, got {}",
                    algorithm.hex_len(),
                    encoded.len()
                ),
            ));
        }
        if !encoded.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(Error::invalid_digest(&self.0, "non-hex characters"));
        }
        Ok(algorithm)
    }

    /// Verifies that this digest matches a payload, using the digest's own
    /// algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigest`] when the digest is malformed or the
    /// payload hashes to a different value.
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        let computed = match self.algorithm()? {
            Algorithm::Sha256 => hex::encode(Sha256::digest(payload)),
            Algorithm::Sha512 => hex::encode(Sha512::digest(payload)),
        };
        let expected = &self.0[self.0.len() - computed.len()..];
        if computed != expected {
            return Err(Error::invalid_digest(
                &self.0,
                "payload does not match declared digest",
            ));
        }
        Ok(())
    }

    /// Returns true when the digest string is empty (an unset descriptor
    /// field).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the digest string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_sha256() {
        let raw = format!("sha256:{}", "a".repeat(64));
        let digest = Digest::parse(&raw).expect("valid digest");
        assert_eq!(digest.as_str(), raw);
        assert_eq!(digest.algorithm().expect("algorithm"), Algorithm::Sha256);
    }

    #[test]
    fn parses_valid_sha512() {
        let raw = format!("sha512:{}", "0f".repeat(64));
        let digest = Digest::parse(&raw).expect("valid digest");
        assert_eq!(digest.algorithm().expect("algorithm"), Algorithm::Sha512);
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(matches!(
            Digest::parse("sha256deadbeef"),
            Err(Error::InvalidDigest { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_algorithm() {
        assert!(Digest::parse(format!("md5:{}", "a".repeat(32))).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Digest::parse("sha256:abcd").is_err());
    }

    #[test]
    fn rejects_uppercase_hex() {
        assert!(Digest::parse(format!("sha256:{}", "A".repeat(64))).is_err());
    }

    #[test]
    fn from_bytes_verifies() {
        let digest = Digest::from_bytes(b"hello world");
        digest.validate().expect("computed digest is valid");
        digest.verify(b"hello world").expect("payload matches");
        assert!(digest.verify(b"hello moon").is_err());
    }

    #[test]
    fn deserialization_is_transparent() {
        let digest: Digest = serde_json::from_str(r#""not-a-digest""#).expect("deserialize");
        assert_eq!(digest.as_str(), "not-a-digest");
        assert!(digest.validate().is_err());
    }
}

use sha2::{Digest, Sha256};

use crate::Error;
use crate::base64::base64_encode;
use crate::types::{Ed25519PublicKey, Ed25519Signature};

/// Stateless helper surface for callers: signature verification and
/// hashing.
#[derive(Debug, Default)]
pub struct Utility;

impl Utility {
    pub fn new() -> Self {
        Self
    }

    /// Verifies an Ed25519 signature, with key and signature supplied as
    /// unpadded base64.
    ///
    /// Empty inputs are rejected as [`Error::InvalidInput`] before any
    /// decoding; a well-formed signature that does not match fails with
    /// [`Error::BadSignature`].
    pub fn ed25519_verify(&self, key: &str, message: &[u8], signature: &str) -> Result<(), Error> {
        if key.is_empty() || message.is_empty() || signature.is_empty() {
            return Err(Error::InvalidInput);
        }

        let key = Ed25519PublicKey::from_base64(key)?;
        let signature = Ed25519Signature::from_base64(signature)?;

        key.verify(message, &signature)
    }

    /// The SHA-256 digest of the input, as unpadded base64.
    pub fn sha256(&self, input: &[u8]) -> String {
        base64_encode(Sha256::digest(input))
    }
}

use ed25519_dalek::ed25519::SignatureBytes;
use ed25519_dalek::{Signature, SecretKey, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::base64::{base64_decode_array, base64_encode};
use crate::{Error, Rng};

/// A public Ed25519 key used to verify signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey(VerifyingKey);

impl Ed25519PublicKey {
    /// The length of the key in bytes.
    pub const LENGTH: usize = 32;

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, Error> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidInput)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Decodes a key from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        if input.is_empty() {
            return Err(Error::InvalidInput);
        }
        Self::from_bytes(&base64_decode_array::<32>(input)?)
    }

    /// Encodes the key as unpadded base64.
    pub fn to_base64(&self) -> String {
        base64_encode(self.as_bytes())
    }

    /// Verifies a signature over a message against this key.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), Error> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| Error::BadSignature)
    }
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature(Signature);

impl Ed25519Signature {
    /// The length of the signature in bytes.
    pub const LENGTH: usize = 64;

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(Signature::from_bytes(&SignatureBytes::from(bytes)))
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Decodes a signature from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        if input.is_empty() {
            return Err(Error::InvalidInput);
        }
        Ok(Self::from_bytes(base64_decode_array::<64>(input)?))
    }

    /// Encodes the signature as unpadded base64.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }
}

/// An Ed25519 signing key pair, zeroized when dropped.
#[derive(Clone)]
pub struct Ed25519Keypair {
    signing_key: SigningKey,
    public: Ed25519PublicKey,
}

impl Ed25519Keypair {
    /// Generates a new signing key pair from the supplied generator.
    pub fn new(rng: &Rng) -> Result<Self, Error> {
        Ok(Self::from_seed(rng.random_array::<32>()?))
    }

    /// Reconstructs a key pair from its 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&SecretKey::from(seed));
        let public = Ed25519PublicKey(signing_key.verifying_key());
        Self {
            signing_key,
            public,
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.public
    }

    /// Signs a message with the secret half of the pair.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message))
    }

    pub(crate) fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Zeroize for Ed25519Keypair {
    fn zeroize(&mut self) {
        // `SigningKey` only implements `ZeroizeOnDrop`, not `Zeroize`. Replacing
        // it drops the previous key, whose `Drop` zeroizes the secret in place.
        self.signing_key = SigningKey::from_bytes(&[0u8; 32]);
    }
}

impl ZeroizeOnDrop for Ed25519Keypair {}

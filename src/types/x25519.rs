use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::base64::{base64_decode_array, base64_encode};
use crate::{Error, Rng};

/// A public Curve25519 key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Curve25519PublicKey(PublicKey);

impl Curve25519PublicKey {
    /// The length of the key in bytes.
    pub const LENGTH: usize = 32;

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Decodes a key from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        if input.is_empty() {
            return Err(Error::InvalidInput);
        }
        Ok(Self::from(base64_decode_array::<32>(input)?))
    }

    /// Encodes the key as unpadded base64.
    pub fn to_base64(&self) -> String {
        base64_encode(self.as_bytes())
    }
}

impl From<[u8; 32]> for Curve25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(PublicKey::from(bytes))
    }
}

impl From<PublicKey> for Curve25519PublicKey {
    fn from(value: PublicKey) -> Self {
        Self(value)
    }
}

impl AsRef<PublicKey> for Curve25519PublicKey {
    fn as_ref(&self) -> &PublicKey {
        &self.0
    }
}

/// A secret Curve25519 key, zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Curve25519SecretKey(Box<StaticSecret>);

impl Curve25519SecretKey {
    /// Generates a new secret key from the supplied generator.
    pub fn new(rng: &Rng) -> Result<Self, Error> {
        Ok(Self::from(rng.random_boxed_array::<32>()?))
    }

    pub(crate) fn dh(&self, public_key: &Curve25519PublicKey) -> SharedSecret {
        self.0.diffie_hellman(public_key.as_ref())
    }

    pub(crate) fn public_key(&self) -> Curve25519PublicKey {
        PublicKey::from(self.0.as_ref()).into()
    }

    pub(crate) fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl From<[u8; 32]> for Curve25519SecretKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(Box::new(StaticSecret::from(bytes)))
    }
}

impl From<Box<[u8; 32]>> for Curve25519SecretKey {
    fn from(mut bytes: Box<[u8; 32]>) -> Self {
        let secret = StaticSecret::from(*bytes);
        bytes.zeroize();
        Self(Box::new(secret))
    }
}

/// A Curve25519 key pair.
///
/// The public half is always the scalar product of the secret half with
/// the curve basepoint.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Curve25519Keypair {
    secret: Curve25519SecretKey,
    #[zeroize(skip)]
    public: Curve25519PublicKey,
}

impl Curve25519Keypair {
    /// Generates a new key pair from the supplied generator.
    pub fn new(rng: &Rng) -> Result<Self, Error> {
        let secret = Curve25519SecretKey::new(rng)?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    pub fn public_key(&self) -> Curve25519PublicKey {
        self.public
    }

    pub(crate) fn secret_key(&self) -> &Curve25519SecretKey {
        &self.secret
    }

    pub(crate) fn dh(&self, public_key: &Curve25519PublicKey) -> SharedSecret {
        self.secret.dh(public_key)
    }
}

impl From<Curve25519SecretKey> for Curve25519Keypair {
    fn from(secret: Curve25519SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_matches_secret() {
        let rng = Rng::from_seed([3u8; 32]);
        let pair = Curve25519Keypair::new(&rng).unwrap();
        assert_eq!(pair.public_key(), pair.secret_key().public_key());
    }

    #[test]
    fn test_diffie_hellman_agreement() {
        let rng = Rng::new();
        let alice = Curve25519Keypair::new(&rng).unwrap();
        let bob = Curve25519Keypair::new(&rng).unwrap();

        let shared_alice = alice.dh(&bob.public_key());
        let shared_bob = bob.dh(&alice.public_key());

        assert_eq!(shared_alice.as_bytes(), shared_bob.as_bytes());
    }

    #[test]
    fn test_base64_round_trip() {
        let rng = Rng::new();
        let pair = Curve25519Keypair::new(&rng).unwrap();

        let encoded = pair.public_key().to_base64();
        let decoded = Curve25519PublicKey::from_base64(&encoded).unwrap();

        assert_eq!(decoded, pair.public_key());
    }

    #[test]
    fn test_from_base64_rejects_empty_input() {
        assert_eq!(Curve25519PublicKey::from_base64(""), Err(Error::InvalidInput));
    }
}

//! Asymmetric envelope encryption to a single recipient key.
//!
//! The sender derives an AES/MAC/IV envelope from an ephemeral
//! Diffie-Hellman exchange with the recipient's public key; the recipient
//! mirrors the derivation with its private key.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::base64::{base64_decode, base64_decode_array, base64_encode};
use crate::cipher::{Cipher, MAC_TRUNCATED_LENGTH};
use crate::pickle::{Decoder, Encoder, Pickleable};
use crate::types::{Curve25519Keypair, Curve25519PublicKey, Curve25519SecretKey};
use crate::{Error, Rng};

const PK_INFO: &[u8] = b"";

const PK_DECRYPTION_PICKLE_VERSION: u32 = 1;

/// An encrypted PK envelope: ciphertext, truncated MAC and the ephemeral
/// key the envelope was derived from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PkMessage {
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) mac: [u8; MAC_TRUNCATED_LENGTH],
    pub(crate) ephemeral_key: Curve25519PublicKey,
}

impl PkMessage {
    /// Builds a message from its three base64-encoded parts.
    pub fn from_base64_parts(ciphertext: &str, mac: &str, ephemeral_key: &str) -> Result<Self, Error> {
        Ok(Self {
            ciphertext: base64_decode(ciphertext)?,
            mac: base64_decode_array::<MAC_TRUNCATED_LENGTH>(mac)?,
            ephemeral_key: Curve25519PublicKey::from_base64(ephemeral_key)?,
        })
    }

    /// The base64-encoded ciphertext.
    pub fn ciphertext(&self) -> String {
        base64_encode(&self.ciphertext)
    }

    /// The base64-encoded truncated MAC.
    pub fn mac(&self) -> String {
        base64_encode(self.mac)
    }

    /// The base64-encoded ephemeral public key.
    pub fn ephemeral_key(&self) -> String {
        self.ephemeral_key.to_base64()
    }
}

/// The sender side: encrypts messages towards one recipient key.
pub struct PkEncryption {
    recipient_key: Curve25519PublicKey,
}

impl PkEncryption {
    /// Creates an encrypter towards the given recipient key.
    pub fn from_key(recipient_key: Curve25519PublicKey) -> Self {
        Self { recipient_key }
    }

    /// Creates an encrypter from a base64-encoded recipient key.
    pub fn from_base64(recipient_key: &str) -> Result<Self, Error> {
        Ok(Self::from_key(Curve25519PublicKey::from_base64(
            recipient_key,
        )?))
    }

    /// Encrypts a plaintext under a fresh ephemeral key.
    pub fn encrypt(&self, plaintext: &[u8], rng: &Rng) -> Result<PkMessage, Error> {
        let ephemeral = Curve25519Keypair::new(rng)?;
        let shared_secret = ephemeral.dh(&self.recipient_key);

        let cipher = Cipher::new(shared_secret.as_bytes(), PK_INFO);
        let ciphertext = cipher.encrypt(plaintext);
        let mac = cipher.truncated_mac(&ciphertext);

        Ok(PkMessage {
            ciphertext,
            mac,
            ephemeral_key: ephemeral.public_key(),
        })
    }
}

/// The recipient side: holds the private key PK messages are encrypted
/// to.
pub struct PkDecryption {
    key: Curve25519Keypair,
}

impl PkDecryption {
    /// Generates a fresh key pair.
    pub fn new(rng: &Rng) -> Result<Self, Error> {
        Ok(Self {
            key: Curve25519Keypair::new(rng)?,
        })
    }

    /// Recreates the decrypter from a previously saved private key.
    pub fn from_private_key(bytes: [u8; 32]) -> Self {
        Self {
            key: Curve25519Keypair::from(Curve25519SecretKey::from(bytes)),
        }
    }

    /// The public key senders encrypt to.
    pub fn public_key(&self) -> Curve25519PublicKey {
        self.key.public_key()
    }

    /// The raw private key, for external backup.
    pub fn private_key(&self) -> [u8; 32] {
        self.key.secret_key().to_bytes()
    }

    /// Decrypts a PK message, verifying its MAC in constant time first.
    pub fn decrypt(&self, message: &PkMessage) -> Result<Vec<u8>, Error> {
        let shared_secret = self.key.dh(&message.ephemeral_key);
        let cipher = Cipher::new(shared_secret.as_bytes(), PK_INFO);

        if !cipher.verify_truncated_mac(&message.ciphertext, &message.mac) {
            return Err(Error::BadMessageMac);
        }

        cipher.decrypt(&message.ciphertext)
    }
}

impl Pickleable for PkDecryption {
    fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new(PK_DECRYPTION_PICKLE_VERSION);
        encoder.write_array(&self.key.secret_key().to_bytes());
        encoder.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut decoder = Decoder::new(bytes, PK_DECRYPTION_PICKLE_VERSION)?;
        let secret = Curve25519SecretKey::from(decoder.read_boxed_array::<32>()?);
        decoder.finish()?;

        Ok(Self {
            key: Curve25519Keypair::from(secret),
        })
    }
}

impl Zeroize for PkDecryption {
    fn zeroize(&mut self) {
        self.key.zeroize();
    }
}

impl ZeroizeOnDrop for PkDecryption {}

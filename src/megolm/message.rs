use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Error;
use crate::base64::{base64_decode, base64_encode};
use crate::megolm::ratchet::RATCHET_LENGTH;
use crate::types::{Ed25519Keypair, Ed25519PublicKey, Ed25519Signature};
use crate::wire::{Reader, encode_bytes, encode_integer};

const VERSION: u8 = 3;
const MESSAGE_INDEX_TAG: u8 = 0x08;
const CIPHERTEXT_TAG: u8 = 0x12;

const SESSION_KEY_VERSION: u8 = 2;
const EXPORTED_SESSION_KEY_VERSION: u8 = 1;

/// An encrypted group message.
///
/// On the wire: `version || message_index || ciphertext || signature`,
/// with the sender's Ed25519 signature covering every byte before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MegolmMessage {
    pub(crate) message_index: u32,
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) signature: Ed25519Signature,
}

impl MegolmMessage {
    /// The ratchet index this message was encrypted at.
    pub fn message_index(&self) -> u32 {
        self.message_index
    }

    pub(crate) fn encode_prefix(message_index: u32, ciphertext: &[u8]) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(ciphertext.len() + 16);
        buffer.push(VERSION);
        encode_integer(&mut buffer, MESSAGE_INDEX_TAG, u64::from(message_index));
        encode_bytes(&mut buffer, CIPHERTEXT_TAG, ciphertext);
        buffer
    }

    /// The bytes the signature covers.
    pub(crate) fn to_signed_bytes(&self) -> Vec<u8> {
        Self::encode_prefix(self.message_index, &self.ciphertext)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_signed_bytes();
        bytes.extend_from_slice(&self.signature.to_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        match reader.read_byte() {
            Ok(VERSION) => {}
            Ok(_) => return Err(Error::BadVersion),
            Err(_) => return Err(Error::InvalidInput),
        }

        let mut signature = [0u8; Ed25519Signature::LENGTH];
        signature.copy_from_slice(reader.split_off_suffix(Ed25519Signature::LENGTH)?);

        let message_index = reader.expect_integer(MESSAGE_INDEX_TAG)?;
        let message_index = u32::try_from(message_index).map_err(|_| Error::BadMessageFormat)?;
        let ciphertext = reader.expect_bytes(CIPHERTEXT_TAG)?.to_vec();

        if reader.remaining() != 0 {
            return Err(Error::BadMessageFormat);
        }

        Ok(Self {
            message_index,
            ciphertext,
            signature: Ed25519Signature::from_bytes(signature),
        })
    }

    /// Encodes the message as unpadded base64 for the caller boundary.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Decodes a message from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        Self::from_bytes(&base64_decode(input)?)
    }
}

/// The signed key bundle an outbound group session publishes so others can
/// follow along.
///
/// Layout: `version || message_index(4 BE) || ratchet(128) ||
/// ed25519_key(32) || signature(64)`, the signature covering everything
/// before it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    #[zeroize(skip)]
    pub(crate) message_index: u32,
    pub(crate) ratchet: Box<[u8; RATCHET_LENGTH]>,
    #[zeroize(skip)]
    pub(crate) signing_key: Ed25519PublicKey,
    #[zeroize(skip)]
    pub(crate) signature: Ed25519Signature,
}

impl SessionKey {
    /// Builds and signs a session key over the given ratchet state.
    pub(crate) fn new(
        message_index: u32,
        ratchet: Box<[u8; RATCHET_LENGTH]>,
        signing_key: &Ed25519Keypair,
    ) -> Self {
        let mut session_key = Self {
            message_index,
            ratchet,
            signing_key: signing_key.public_key(),
            signature: Ed25519Signature::from_bytes([0u8; Ed25519Signature::LENGTH]),
        };
        session_key.signature = signing_key.sign(&session_key.to_signed_bytes());

        session_key
    }

    pub(crate) fn to_signed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 4 + RATCHET_LENGTH + Ed25519PublicKey::LENGTH);
        bytes.push(SESSION_KEY_VERSION);
        bytes.extend_from_slice(&self.message_index.to_be_bytes());
        bytes.extend_from_slice(self.ratchet.as_slice());
        bytes.extend_from_slice(self.signing_key.as_bytes());
        bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_signed_bytes();
        bytes.extend_from_slice(&self.signature.to_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let expected =
            1 + 4 + RATCHET_LENGTH + Ed25519PublicKey::LENGTH + Ed25519Signature::LENGTH;
        if bytes.len() != expected {
            return Err(Error::InvalidInput);
        }
        if bytes[0] != SESSION_KEY_VERSION {
            return Err(Error::BadVersion);
        }

        let message_index = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);

        let mut ratchet = Box::new([0u8; RATCHET_LENGTH]);
        ratchet.copy_from_slice(&bytes[5..5 + RATCHET_LENGTH]);

        let mut key = [0u8; Ed25519PublicKey::LENGTH];
        key.copy_from_slice(&bytes[133..133 + Ed25519PublicKey::LENGTH]);

        let mut signature = [0u8; Ed25519Signature::LENGTH];
        signature.copy_from_slice(&bytes[165..]);

        Ok(Self {
            message_index,
            ratchet,
            signing_key: Ed25519PublicKey::from_bytes(&key)?,
            signature: Ed25519Signature::from_bytes(signature),
        })
    }

    /// Encodes the session key as unpadded base64.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Decodes a session key from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        Self::from_bytes(&base64_decode(input)?)
    }
}

/// An unsigned ratchet export at a chosen index.
///
/// Layout: `version || message_index(4 BE) || ratchet(128) ||
/// ed25519_key(32)`. Trust in the signing key is anchored by whatever
/// channel delivered the export.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ExportedSessionKey {
    #[zeroize(skip)]
    pub(crate) message_index: u32,
    pub(crate) ratchet: Box<[u8; RATCHET_LENGTH]>,
    #[zeroize(skip)]
    pub(crate) signing_key: Ed25519PublicKey,
}

impl ExportedSessionKey {
    /// The first index this export can decrypt.
    pub fn message_index(&self) -> u32 {
        self.message_index
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 4 + RATCHET_LENGTH + Ed25519PublicKey::LENGTH);
        bytes.push(EXPORTED_SESSION_KEY_VERSION);
        bytes.extend_from_slice(&self.message_index.to_be_bytes());
        bytes.extend_from_slice(self.ratchet.as_slice());
        bytes.extend_from_slice(self.signing_key.as_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let expected = 1 + 4 + RATCHET_LENGTH + Ed25519PublicKey::LENGTH;
        if bytes.len() != expected {
            return Err(Error::InvalidInput);
        }
        if bytes[0] != EXPORTED_SESSION_KEY_VERSION {
            return Err(Error::BadVersion);
        }

        let message_index = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);

        let mut ratchet = Box::new([0u8; RATCHET_LENGTH]);
        ratchet.copy_from_slice(&bytes[5..5 + RATCHET_LENGTH]);

        let mut key = [0u8; Ed25519PublicKey::LENGTH];
        key.copy_from_slice(&bytes[133..]);

        Ok(Self {
            message_index,
            ratchet,
            signing_key: Ed25519PublicKey::from_bytes(&key)?,
        })
    }

    /// Encodes the export as unpadded base64.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Decodes an export from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        Self::from_bytes(&base64_decode(input)?)
    }
}

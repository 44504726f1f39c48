mod message;
mod ratchet;

pub use message::{ExportedSessionKey, MegolmMessage, SessionKey};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::Cipher;
use crate::megolm::ratchet::{MegolmRatchet, RATCHET_LENGTH};
use crate::pickle::{Decoder, Encoder, Pickleable};
use crate::types::{Ed25519Keypair, Ed25519PublicKey};
use crate::{Error, Rng};

const MEGOLM_KEYS_INFO: &[u8] = b"MEGOLM_KEYS";

const GROUP_SESSION_PICKLE_VERSION: u32 = 1;
const INBOUND_GROUP_SESSION_PICKLE_VERSION: u32 = 1;

/// The sender side of a Megolm group session.
///
/// Holds the symmetric ratchet and the Ed25519 key that signs every
/// ciphertext. The ratchet state is shared with receivers out of band,
/// typically over established Olm sessions, via
/// [`GroupSession::session_key`].
pub struct GroupSession {
    ratchet: MegolmRatchet,
    signing_key: Ed25519Keypair,
}

impl GroupSession {
    /// Creates a new group session with fresh ratchet and signing keys.
    pub fn new(rng: &Rng) -> Result<Self, Error> {
        Ok(Self {
            ratchet: MegolmRatchet::new(rng)?,
            signing_key: Ed25519Keypair::new(rng)?,
        })
    }

    /// The session identifier: the public signing key, identical for the
    /// sender and every receiver.
    pub fn session_id(&self) -> String {
        self.signing_key.public_key().to_base64()
    }

    /// The index the next message will be encrypted at.
    pub fn message_index(&self) -> u32 {
        self.ratchet.counter()
    }

    /// Exports the current ratchet state as a signed session key.
    ///
    /// A receiver initialized from it can decrypt every message from the
    /// current index onward.
    pub fn session_key(&self) -> SessionKey {
        let mut ratchet = Box::new([0u8; RATCHET_LENGTH]);
        ratchet.copy_from_slice(self.ratchet.as_bytes());

        SessionKey::new(self.ratchet.counter(), ratchet, &self.signing_key)
    }

    /// Encrypts a plaintext at the current index and advances the
    /// ratchet.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> MegolmMessage {
        let cipher = Cipher::new(self.ratchet.as_bytes(), MEGOLM_KEYS_INFO);
        let ciphertext = cipher.encrypt(plaintext);

        let message_index = self.ratchet.counter();
        let signed_bytes = MegolmMessage::encode_prefix(message_index, &ciphertext);
        let signature = self.signing_key.sign(&signed_bytes);

        self.ratchet.advance();

        MegolmMessage {
            message_index,
            ciphertext,
            signature,
        }
    }
}

impl Pickleable for GroupSession {
    fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new(GROUP_SESSION_PICKLE_VERSION);

        encoder.write_array(self.ratchet.as_bytes());
        encoder.write_u32(self.ratchet.counter());
        encoder.write_array(&self.signing_key.to_seed());

        encoder.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut decoder = Decoder::new(bytes, GROUP_SESSION_PICKLE_VERSION)?;

        let ratchet = decoder.read_boxed_array::<RATCHET_LENGTH>()?;
        let counter = decoder.read_u32()?;
        let signing_key = Ed25519Keypair::from_seed(decoder.read_array::<32>()?);

        decoder.finish()?;

        Ok(Self {
            ratchet: MegolmRatchet::from_bytes(ratchet, counter),
            signing_key,
        })
    }
}

impl Zeroize for GroupSession {
    fn zeroize(&mut self) {
        self.ratchet.zeroize();
        self.signing_key.zeroize();
    }
}

impl ZeroizeOnDrop for GroupSession {}

/// The receiver side of a Megolm group session.
///
/// Keeps the ratchet state frozen at the initialization index next to the
/// furthest state reached so far, so any index at or after the first
/// known one stays decryptable regardless of delivery order.
pub struct InboundGroupSession {
    initial_ratchet: MegolmRatchet,
    latest_ratchet: MegolmRatchet,
    signing_key: Ed25519PublicKey,
    signing_key_verified: bool,
}

impl InboundGroupSession {
    /// Creates a receiver from a signed session key.
    ///
    /// The embedded signature is verified against the embedded signing
    /// key before any state is built.
    pub fn new(session_key: &SessionKey) -> Result<Self, Error> {
        session_key
            .signing_key
            .verify(&session_key.to_signed_bytes(), &session_key.signature)?;

        let mut ratchet = Box::new([0u8; RATCHET_LENGTH]);
        ratchet.copy_from_slice(session_key.ratchet.as_slice());
        let ratchet = MegolmRatchet::from_bytes(ratchet, session_key.message_index);

        Ok(Self {
            initial_ratchet: ratchet.clone(),
            latest_ratchet: ratchet,
            signing_key: session_key.signing_key,
            signing_key_verified: true,
        })
    }

    /// Creates a receiver from an unsigned export.
    ///
    /// The signing key is taken on faith until the first message verifies
    /// against it; see [`InboundGroupSession::is_verified`].
    pub fn import(exported: &ExportedSessionKey) -> Self {
        let mut ratchet = Box::new([0u8; RATCHET_LENGTH]);
        ratchet.copy_from_slice(exported.ratchet.as_slice());
        let ratchet = MegolmRatchet::from_bytes(ratchet, exported.message_index);

        Self {
            initial_ratchet: ratchet.clone(),
            latest_ratchet: ratchet,
            signing_key: exported.signing_key,
            signing_key_verified: false,
        }
    }

    /// The session identifier, matching the sender's.
    pub fn session_id(&self) -> String {
        self.signing_key.to_base64()
    }

    /// The earliest message index this session can decrypt.
    pub fn first_known_index(&self) -> u32 {
        self.initial_ratchet.counter()
    }

    /// Whether the signing key has been proven to match the ratchet,
    /// either by a signed session key or by a successfully verified
    /// message.
    pub fn is_verified(&self) -> bool {
        self.signing_key_verified
    }

    /// Decrypts a group message, returning the plaintext and the index it
    /// was encrypted at.
    ///
    /// The caller is responsible for replay tracking by `(session_id,
    /// message_index)`; decryption itself is deterministic and repeatable.
    pub fn decrypt(&mut self, message: &MegolmMessage) -> Result<(Vec<u8>, u32), Error> {
        self.signing_key
            .verify(&message.to_signed_bytes(), &message.signature)?;

        let message_index = message.message_index;
        if message_index < self.first_known_index() {
            return Err(Error::UnknownMessageIndex);
        }

        // Reach the message's index from the furthest state when moving
        // forward, otherwise rewind via the frozen initial state.
        let mut ratchet = if message_index >= self.latest_ratchet.counter() {
            self.latest_ratchet.clone()
        } else {
            self.initial_ratchet.clone()
        };
        ratchet.advance_to(message_index);

        let cipher = Cipher::new(ratchet.as_bytes(), MEGOLM_KEYS_INFO);
        let plaintext = cipher.decrypt(&message.ciphertext)?;

        if ratchet.counter() >= self.latest_ratchet.counter() {
            self.latest_ratchet = ratchet;
        }
        self.signing_key_verified = true;

        Ok((plaintext, message_index))
    }

    /// Exports the ratchet state at the given index for distribution.
    ///
    /// Fails with [`Error::UnknownMessageIndex`] for indices before
    /// [`InboundGroupSession::first_known_index`].
    pub fn export_at(&self, index: u32) -> Result<ExportedSessionKey, Error> {
        if index < self.first_known_index() {
            return Err(Error::UnknownMessageIndex);
        }

        let mut ratchet = if index >= self.latest_ratchet.counter() {
            self.latest_ratchet.clone()
        } else {
            self.initial_ratchet.clone()
        };
        ratchet.advance_to(index);

        let mut bytes = Box::new([0u8; RATCHET_LENGTH]);
        bytes.copy_from_slice(ratchet.as_bytes());

        Ok(ExportedSessionKey {
            message_index: index,
            ratchet: bytes,
            signing_key: self.signing_key,
        })
    }
}

impl Pickleable for InboundGroupSession {
    fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new(INBOUND_GROUP_SESSION_PICKLE_VERSION);

        encoder.write_array(self.initial_ratchet.as_bytes());
        encoder.write_u32(self.initial_ratchet.counter());
        encoder.write_array(self.latest_ratchet.as_bytes());
        encoder.write_u32(self.latest_ratchet.counter());
        encoder.write_array(self.signing_key.as_bytes());
        encoder.write_bool(self.signing_key_verified);

        encoder.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut decoder = Decoder::new(bytes, INBOUND_GROUP_SESSION_PICKLE_VERSION)?;

        let initial_ratchet = decoder.read_boxed_array::<RATCHET_LENGTH>()?;
        let initial_counter = decoder.read_u32()?;
        let latest_ratchet = decoder.read_boxed_array::<RATCHET_LENGTH>()?;
        let latest_counter = decoder.read_u32()?;
        let signing_key = Ed25519PublicKey::from_bytes(&decoder.read_array::<32>()?)
            .map_err(|_| Error::InvalidField)?;
        let signing_key_verified = decoder.read_bool()?;

        decoder.finish()?;

        if latest_counter < initial_counter {
            return Err(Error::InvalidField);
        }

        Ok(Self {
            initial_ratchet: MegolmRatchet::from_bytes(initial_ratchet, initial_counter),
            latest_ratchet: MegolmRatchet::from_bytes(latest_ratchet, latest_counter),
            signing_key,
            signing_key_verified,
        })
    }
}

impl Zeroize for InboundGroupSession {
    fn zeroize(&mut self) {
        self.initial_ratchet.zeroize();
        self.latest_ratchet.zeroize();
    }
}

impl ZeroizeOnDrop for InboundGroupSession {}

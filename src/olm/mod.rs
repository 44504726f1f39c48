mod chain;
mod messages;

pub use messages::{Message, OlmMessage, PreKeyMessage};

use std::collections::VecDeque;

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use x25519_dalek::SharedSecret;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::base64::base64_encode;
use crate::olm::chain::{ChainKey, MessageKey};
use crate::pickle::{Decoder, Encoder, Pickleable};
use crate::types::{Curve25519Keypair, Curve25519PublicKey, Curve25519SecretKey};
use crate::{Error, Rng};

/// Upper bound on cached message keys for out-of-order delivery.
pub(crate) const MAX_SKIPPED_MESSAGE_KEYS: usize = 40;
/// Upper bound on retained receiver chains.
pub(crate) const MAX_RECEIVER_CHAINS: usize = 5;

const ROOT_INFO: &[u8] = b"OLM_ROOT";
const RATCHET_INFO: &[u8] = b"OLM_RATCHET";

const SESSION_PICKLE_VERSION: u32 = 1;

/// The three public keys that identify an Olm session on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SessionKeys {
    pub(crate) identity_key: Curve25519PublicKey,
    pub(crate) base_key: Curve25519PublicKey,
    pub(crate) one_time_key: Curve25519PublicKey,
}

/// The concatenated output of the handshake's three Diffie-Hellman
/// exchanges, consumed to derive the initial root and chain keys.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Shared3DHSecret(Box<[u8; 96]>);

impl Shared3DHSecret {
    pub(crate) fn new(dh1: SharedSecret, dh2: SharedSecret, dh3: SharedSecret) -> Self {
        let mut bytes = Box::new([0u8; 96]);

        bytes[0..32].copy_from_slice(dh1.as_bytes());
        bytes[32..64].copy_from_slice(dh2.as_bytes());
        bytes[64..96].copy_from_slice(dh3.as_bytes());

        Self(bytes)
    }

    /// Derives `root_key || chain_key` from the handshake secret.
    fn derive_root(self) -> (Box<[u8; 32]>, Box<[u8; 32]>) {
        let hkdf = Hkdf::<Sha256>::new(None, self.0.as_slice());

        let mut expanded = [0u8; 64];
        hkdf.expand(ROOT_INFO, &mut expanded)
            .expect("64 bytes is a valid HKDF-SHA256 output length");

        split_key_pair(&mut expanded)
    }
}

/// Advances the root key with a fresh ratchet DH output, yielding the next
/// `root_key || chain_key` pair. The old root key is discarded.
fn advance_root_key(root_key: &[u8; 32], shared: SharedSecret) -> (Box<[u8; 32]>, Box<[u8; 32]>) {
    let hkdf = Hkdf::<Sha256>::new(Some(root_key), shared.as_bytes());

    let mut expanded = [0u8; 64];
    hkdf.expand(RATCHET_INFO, &mut expanded)
        .expect("64 bytes is a valid HKDF-SHA256 output length");

    split_key_pair(&mut expanded)
}

fn split_key_pair(expanded: &mut [u8; 64]) -> (Box<[u8; 32]>, Box<[u8; 32]>) {
    let mut first = Box::new([0u8; 32]);
    let mut second = Box::new([0u8; 32]);

    first.copy_from_slice(&expanded[0..32]);
    second.copy_from_slice(&expanded[32..64]);
    expanded.zeroize();

    (first, second)
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SenderChain {
    ratchet_key: Curve25519Keypair,
    chain_key: ChainKey,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct ReceiverChain {
    #[zeroize(skip)]
    ratchet_key: Curve25519PublicKey,
    chain_key: ChainKey,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct SkippedMessageKey {
    #[zeroize(skip)]
    ratchet_key: Curve25519PublicKey,
    message_key: MessageKey,
}

/// A one-to-one double-ratchet session.
///
/// Sessions come out of an [`Account`](crate::Account): the initiator
/// creates an outbound session against a peer's identity and one-time
/// keys, the responder an inbound session from the resulting pre-key
/// message. Once both sides hold a session, messages decrypt in any
/// delivery order within the skipped-key bounds.
///
/// Decryption is transactional: a failed call leaves the ratchet exactly
/// as it was, so the caller may retry with a corrected message.
pub struct Session {
    session_keys: SessionKeys,
    root_key: Box<[u8; 32]>,
    sender_chain: Option<SenderChain>,
    receiver_chains: VecDeque<ReceiverChain>,
    skipped_message_keys: VecDeque<SkippedMessageKey>,
    received_message: bool,
    sent_message_count: u32,
    received_message_count: u32,
}

impl Session {
    pub(crate) fn new_outbound(
        shared_secret: Shared3DHSecret,
        session_keys: SessionKeys,
        base_key: Curve25519Keypair,
    ) -> Self {
        let (root_key, chain_key) = shared_secret.derive_root();

        Self {
            session_keys,
            root_key,
            sender_chain: Some(SenderChain {
                ratchet_key: base_key,
                chain_key: ChainKey::new(chain_key),
            }),
            receiver_chains: VecDeque::new(),
            skipped_message_keys: VecDeque::new(),
            received_message: false,
            sent_message_count: 0,
            received_message_count: 0,
        }
    }

    pub(crate) fn new_inbound(
        shared_secret: Shared3DHSecret,
        session_keys: SessionKeys,
        their_ratchet_key: Curve25519PublicKey,
    ) -> Self {
        let (root_key, chain_key) = shared_secret.derive_root();

        let mut receiver_chains = VecDeque::new();
        receiver_chains.push_back(ReceiverChain {
            ratchet_key: their_ratchet_key,
            chain_key: ChainKey::new(chain_key),
        });

        Self {
            session_keys,
            root_key,
            sender_chain: None,
            receiver_chains,
            skipped_message_keys: VecDeque::new(),
            received_message: false,
            sent_message_count: 0,
            received_message_count: 0,
        }
    }

    /// The session identifier, identical on both ends of the conversation.
    ///
    /// Computed as the SHA-256 of the initiator's identity key, the
    /// handshake base key and the consumed one-time key.
    pub fn session_id(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(self.session_keys.identity_key.as_bytes());
        hasher.update(self.session_keys.base_key.as_bytes());
        hasher.update(self.session_keys.one_time_key.as_bytes());

        base64_encode(hasher.finalize())
    }

    /// Whether this session has successfully decrypted a message.
    ///
    /// Until it has, the initiator keeps wrapping ciphertexts in pre-key
    /// messages so the responder can still establish its side.
    pub fn has_received_message(&self) -> bool {
        self.received_message
    }

    /// Number of messages sent on the current sender chain.
    pub fn sent_message_count(&self) -> u32 {
        self.sent_message_count
    }

    /// Number of messages successfully decrypted over the session's
    /// lifetime.
    pub fn received_message_count(&self) -> u32 {
        self.received_message_count
    }

    /// Checks whether a pre-key message belongs to this session without
    /// touching any state.
    pub fn matches_inbound(&self, message: &PreKeyMessage) -> bool {
        let candidate = SessionKeys {
            identity_key: message.identity_key(),
            base_key: message.base_key(),
            one_time_key: message.one_time_key(),
        };

        candidate == self.session_keys
    }

    /// Like [`Session::matches_inbound`], additionally asserting the
    /// sender's claimed identity key.
    pub fn matches_inbound_from(
        &self,
        their_identity_key: &Curve25519PublicKey,
        message: &PreKeyMessage,
    ) -> bool {
        *their_identity_key == message.identity_key() && self.matches_inbound(message)
    }

    /// Encrypts a plaintext, advancing the sender chain.
    ///
    /// After any received message the previous sender chain is retired, so
    /// the first encrypt performs a DH ratchet step under a fresh ratchet
    /// key.
    pub fn encrypt(&mut self, plaintext: &[u8], rng: &Rng) -> Result<OlmMessage, Error> {
        if self.sender_chain.is_none() {
            self.create_sender_chain(rng)?;
        }

        let sender_chain = self.sender_chain.as_mut().ok_or(Error::InvalidInput)?;

        let ratchet_key = sender_chain.ratchet_key.public_key();
        let message_key = sender_chain.chain_key.create_message_key();

        let cipher = message_key.cipher();
        let ciphertext = cipher.encrypt(plaintext);

        let mac_bytes = Message::encode_prefix(&ratchet_key, message_key.index(), &ciphertext);
        let mac = cipher.truncated_mac(&mac_bytes);

        let message = Message {
            ratchet_key,
            counter: message_key.index(),
            ciphertext,
            mac,
        };

        self.sent_message_count = self.sent_message_count.wrapping_add(1);

        if self.received_message {
            Ok(OlmMessage::Normal(message))
        } else {
            Ok(OlmMessage::PreKey(PreKeyMessage {
                one_time_key: self.session_keys.one_time_key,
                base_key: self.session_keys.base_key,
                identity_key: self.session_keys.identity_key,
                message,
            }))
        }
    }

    /// Decrypts either kind of Olm message.
    pub fn decrypt(&mut self, message: &OlmMessage) -> Result<Vec<u8>, Error> {
        match message {
            OlmMessage::Normal(message) => self.decrypt_message(message),
            OlmMessage::PreKey(message) => self.decrypt_message(&message.message),
        }
    }

    pub(crate) fn decrypt_message(&mut self, message: &Message) -> Result<Vec<u8>, Error> {
        let mac_bytes = message.to_mac_bytes();

        // A skipped key caches an out-of-order message that has already
        // been ratcheted past.
        if let Some(position) = self.skipped_message_keys.iter().position(|skipped| {
            skipped.ratchet_key == message.ratchet_key
                && skipped.message_key.index() == message.counter
        }) {
            let cipher = self.skipped_message_keys[position].message_key.cipher();
            if !cipher.verify_truncated_mac(&mac_bytes, &message.mac) {
                return Err(Error::BadMessageMac);
            }

            let plaintext = cipher.decrypt(&message.ciphertext)?;

            // The key is single-use; only a verified message consumes it.
            self.skipped_message_keys.remove(position);
            self.note_received();

            return Ok(plaintext);
        }

        let known_chain = self
            .receiver_chains
            .iter()
            .position(|chain| chain.ratchet_key == message.ratchet_key);

        match known_chain {
            Some(index) => {
                let chain = &self.receiver_chains[index];
                if message.counter < chain.chain_key.index() {
                    // The message key was consumed and is no longer cached.
                    return Err(Error::BadMessageMac);
                }

                let (plaintext, chain_key, skipped) =
                    fast_forward_decrypt(chain.chain_key.clone(), message, &mac_bytes)?;

                self.receiver_chains[index].chain_key = chain_key;
                self.store_skipped_keys(skipped);
                self.note_received();

                Ok(plaintext)
            }
            None => {
                // A ratchet key we have not seen: the peer performed a DH
                // ratchet step, so mirror it with our current ratchet key.
                let Some(sender_chain) = &self.sender_chain else {
                    return Err(Error::BadMessageMac);
                };

                let shared = sender_chain.ratchet_key.dh(&message.ratchet_key);
                let (root_key, chain_key) = advance_root_key(&self.root_key, shared);

                let (plaintext, chain_key, skipped) =
                    fast_forward_decrypt(ChainKey::new(chain_key), message, &mac_bytes)?;

                self.root_key = root_key;
                self.receiver_chains.push_back(ReceiverChain {
                    ratchet_key: message.ratchet_key,
                    chain_key,
                });
                if self.receiver_chains.len() > MAX_RECEIVER_CHAINS {
                    if let Some(evicted) = self.receiver_chains.pop_front() {
                        self.skipped_message_keys
                            .retain(|skipped| skipped.ratchet_key != evicted.ratchet_key);
                    }
                }

                // The old sender chain is retired; the next encrypt starts
                // a new one under a fresh ratchet key.
                self.sender_chain = None;

                self.store_skipped_keys(skipped);
                self.note_received();

                Ok(plaintext)
            }
        }
    }

    fn create_sender_chain(&mut self, rng: &Rng) -> Result<(), Error> {
        let their_ratchet_key = self
            .receiver_chains
            .back()
            .map(|chain| chain.ratchet_key)
            .ok_or(Error::InvalidInput)?;

        let ratchet_key = Curve25519Keypair::new(rng)?;
        let shared = ratchet_key.dh(&their_ratchet_key);
        let (root_key, chain_key) = advance_root_key(&self.root_key, shared);

        self.root_key = root_key;
        self.sender_chain = Some(SenderChain {
            ratchet_key,
            chain_key: ChainKey::new(chain_key),
        });
        self.sent_message_count = 0;

        Ok(())
    }

    fn note_received(&mut self) {
        self.received_message = true;
        self.received_message_count = self.received_message_count.wrapping_add(1);
    }

    fn store_skipped_keys(&mut self, skipped: Vec<SkippedMessageKey>) {
        self.skipped_message_keys.extend(skipped);

        while self.skipped_message_keys.len() > MAX_SKIPPED_MESSAGE_KEYS {
            self.skipped_message_keys.pop_front();
        }
    }
}

/// Advances a copy of a receiver chain up to the message's index, caching
/// every skipped key on the way, and decrypts.
///
/// Nothing here touches session state; the caller commits the returned
/// chain and skipped keys only after success.
fn fast_forward_decrypt(
    mut chain_key: ChainKey,
    message: &Message,
    mac_bytes: &[u8],
) -> Result<(Vec<u8>, ChainKey, Vec<SkippedMessageKey>), Error> {
    let gap = message.counter - chain_key.index();
    if gap as usize > MAX_SKIPPED_MESSAGE_KEYS {
        return Err(Error::MessageIndexTooFar);
    }

    let mut skipped = Vec::with_capacity(gap as usize);
    while chain_key.index() < message.counter {
        skipped.push(SkippedMessageKey {
            ratchet_key: message.ratchet_key,
            message_key: chain_key.create_message_key(),
        });
    }

    let message_key = chain_key.create_message_key();
    let cipher = message_key.cipher();

    if !cipher.verify_truncated_mac(mac_bytes, &message.mac) {
        return Err(Error::BadMessageMac);
    }

    let plaintext = cipher.decrypt(&message.ciphertext)?;
    Ok((plaintext, chain_key, skipped))
}

impl Pickleable for Session {
    fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new(SESSION_PICKLE_VERSION);

        encoder.write_array(self.session_keys.identity_key.as_bytes());
        encoder.write_array(self.session_keys.base_key.as_bytes());
        encoder.write_array(self.session_keys.one_time_key.as_bytes());

        encoder.write_array(self.root_key.as_slice());
        encoder.write_bool(self.received_message);
        encoder.write_u32(self.sent_message_count);
        encoder.write_u32(self.received_message_count);

        match &self.sender_chain {
            Some(chain) => {
                encoder.write_bool(true);
                encoder.write_array(&chain.ratchet_key.secret_key().to_bytes());
                encoder.write_array(chain.chain_key.key_bytes());
                encoder.write_u32(chain.chain_key.index());
            }
            None => encoder.write_bool(false),
        }

        encoder.write_u32(self.receiver_chains.len() as u32);
        for chain in &self.receiver_chains {
            encoder.write_array(chain.ratchet_key.as_bytes());
            encoder.write_array(chain.chain_key.key_bytes());
            encoder.write_u32(chain.chain_key.index());
        }

        encoder.write_u32(self.skipped_message_keys.len() as u32);
        for skipped in &self.skipped_message_keys {
            encoder.write_array(skipped.ratchet_key.as_bytes());
            encoder.write_u32(skipped.message_key.index());
            encoder.write_array(skipped.message_key.key_bytes());
        }

        encoder.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut decoder = Decoder::new(bytes, SESSION_PICKLE_VERSION)?;

        let session_keys = SessionKeys {
            identity_key: Curve25519PublicKey::from(decoder.read_array::<32>()?),
            base_key: Curve25519PublicKey::from(decoder.read_array::<32>()?),
            one_time_key: Curve25519PublicKey::from(decoder.read_array::<32>()?),
        };

        let root_key = decoder.read_boxed_array::<32>()?;
        let received_message = decoder.read_bool()?;
        let sent_message_count = decoder.read_u32()?;
        let received_message_count = decoder.read_u32()?;

        let sender_chain = if decoder.read_bool()? {
            let secret = Curve25519SecretKey::from(decoder.read_boxed_array::<32>()?);
            let chain_key = decoder.read_boxed_array::<32>()?;
            let index = decoder.read_u32()?;

            Some(SenderChain {
                ratchet_key: Curve25519Keypair::from(secret),
                chain_key: ChainKey::from_parts(chain_key, index),
            })
        } else {
            None
        };

        let chain_count = decoder.read_u32()? as usize;
        if chain_count > MAX_RECEIVER_CHAINS {
            return Err(Error::TooManyChains);
        }

        let mut receiver_chains = VecDeque::with_capacity(chain_count);
        for _ in 0..chain_count {
            let ratchet_key = Curve25519PublicKey::from(decoder.read_array::<32>()?);
            let chain_key = decoder.read_boxed_array::<32>()?;
            let index = decoder.read_u32()?;

            receiver_chains.push_back(ReceiverChain {
                ratchet_key,
                chain_key: ChainKey::from_parts(chain_key, index),
            });
        }

        let skipped_count = decoder.read_u32()? as usize;
        if skipped_count > MAX_SKIPPED_MESSAGE_KEYS {
            return Err(Error::MessageIndexTooFar);
        }

        let mut skipped_message_keys = VecDeque::with_capacity(skipped_count);
        for _ in 0..skipped_count {
            let ratchet_key = Curve25519PublicKey::from(decoder.read_array::<32>()?);
            let index = decoder.read_u32()?;
            let key = decoder.read_boxed_array::<32>()?;

            skipped_message_keys.push_back(SkippedMessageKey {
                ratchet_key,
                message_key: MessageKey::from_bytes(key, index),
            });
        }

        decoder.finish()?;

        // A session always has a live chain in at least one direction.
        if sender_chain.is_none() && receiver_chains.is_empty() {
            return Err(Error::InvalidField);
        }

        Ok(Self {
            session_keys,
            root_key,
            sender_chain,
            receiver_chains,
            skipped_message_keys,
            received_message,
            sent_message_count,
            received_message_count,
        })
    }
}

impl Zeroize for Session {
    fn zeroize(&mut self) {
        self.root_key.zeroize();
        // Chains and skipped keys zeroize themselves when dropped.
        self.sender_chain = None;
        self.receiver_chains.clear();
        self.skipped_message_keys.clear();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for Session {}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_pair() -> (Session, Session) {
        let rng = Rng::from_seed([42u8; 32]);

        let alice_identity = Curve25519Keypair::new(&rng).unwrap();
        let bob_identity = Curve25519Keypair::new(&rng).unwrap();
        let bob_one_time = Curve25519Keypair::new(&rng).unwrap();
        let base_key = Curve25519Keypair::new(&rng).unwrap();

        let session_keys = SessionKeys {
            identity_key: alice_identity.public_key(),
            base_key: base_key.public_key(),
            one_time_key: bob_one_time.public_key(),
        };

        let alice_shared = Shared3DHSecret::new(
            alice_identity.dh(&bob_one_time.public_key()),
            base_key.dh(&bob_identity.public_key()),
            base_key.dh(&bob_one_time.public_key()),
        );
        let bob_shared = Shared3DHSecret::new(
            bob_one_time.dh(&alice_identity.public_key()),
            bob_identity.dh(&base_key.public_key()),
            bob_one_time.dh(&base_key.public_key()),
        );

        let their_ratchet_key = base_key.public_key();
        let alice = Session::new_outbound(alice_shared, session_keys, base_key);
        let bob = Session::new_inbound(bob_shared, session_keys, their_ratchet_key);

        (alice, bob)
    }

    #[test]
    fn test_lockstep_conversation() {
        let rng = Rng::new();
        let (mut alice, mut bob) = session_pair();

        for round in 0..4 {
            let outbound = format!("ping {round}");
            let message = alice.encrypt(outbound.as_bytes(), &rng).unwrap();
            assert_eq!(bob.decrypt(&message).unwrap(), outbound.as_bytes());

            let reply = format!("pong {round}");
            let message = bob.encrypt(reply.as_bytes(), &rng).unwrap();
            assert_eq!(alice.decrypt(&message).unwrap(), reply.as_bytes());
        }

        assert_eq!(alice.session_id(), bob.session_id());
    }

    #[test]
    fn test_message_type_switches_after_first_receive() {
        let rng = Rng::new();
        let (mut alice, mut bob) = session_pair();

        let first = alice.encrypt(b"hello", &rng).unwrap();
        assert_eq!(first.message_type(), 0);

        bob.decrypt(&first).unwrap();
        let reply = bob.encrypt(b"hi", &rng).unwrap();
        assert_eq!(reply.message_type(), 1);

        alice.decrypt(&reply).unwrap();
        let second = alice.encrypt(b"hello again", &rng).unwrap();
        assert_eq!(second.message_type(), 1);
    }

    #[test]
    fn test_out_of_order_delivery() {
        let rng = Rng::new();
        let (mut alice, mut bob) = session_pair();

        let messages: Vec<_> = (0..10)
            .map(|i| {
                let plaintext = format!("message {i}");
                (plaintext.clone(), alice.encrypt(plaintext.as_bytes(), &rng).unwrap())
            })
            .collect();

        for index in [3usize, 0, 7, 1, 9, 2, 8, 4, 5, 6] {
            let (plaintext, message) = &messages[index];
            assert_eq!(bob.decrypt(message).unwrap(), plaintext.as_bytes());
        }

        assert!(bob.skipped_message_keys.is_empty());
    }

    #[test]
    fn test_replay_fails_once_key_is_consumed() {
        let rng = Rng::new();
        let (mut alice, mut bob) = session_pair();

        let message = alice.encrypt(b"only once", &rng).unwrap();
        assert!(bob.decrypt(&message).is_ok());
        assert_eq!(bob.decrypt(&message), Err(Error::BadMessageMac));
    }

    #[test]
    fn test_tampered_mac_is_rejected_without_state_change() {
        let rng = Rng::new();
        let (mut alice, mut bob) = session_pair();

        let original = alice.encrypt(b"intact", &rng).unwrap();
        let mut bytes = original.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let tampered = OlmMessage::PreKey(PreKeyMessage::from_bytes(&bytes).unwrap());
        assert_eq!(bob.decrypt(&tampered), Err(Error::BadMessageMac));

        // The untampered message still decrypts afterwards.
        assert_eq!(bob.decrypt(&original).unwrap(), b"intact");
    }

    #[test]
    fn test_skipping_too_far_fails() {
        let rng = Rng::new();
        let (mut alice, mut bob) = session_pair();

        let mut last = None;
        for i in 0..(MAX_SKIPPED_MESSAGE_KEYS + 2) {
            last = Some(alice.encrypt(format!("m{i}").as_bytes(), &rng).unwrap());
        }

        assert_eq!(
            bob.decrypt(&last.unwrap()),
            Err(Error::MessageIndexTooFar)
        );

        // The failure must not have advanced the chain.
        assert_eq!(bob.received_message_count(), 0);
    }

    #[test]
    fn test_matches_inbound() {
        let rng = Rng::new();
        let (mut alice, bob) = session_pair();

        let message = alice.encrypt(b"hello", &rng).unwrap();
        let OlmMessage::PreKey(pre_key) = message else {
            unreachable!("the first message is always a pre-key message");
        };

        assert!(bob.matches_inbound(&pre_key));

        let wrong_identity = Curve25519Keypair::new(&rng).unwrap().public_key();
        assert!(!bob.matches_inbound_from(&wrong_identity, &pre_key));
    }

    #[test]
    fn test_pickle_round_trip_preserves_ratchet_state() {
        let rng = Rng::new();
        let (mut alice, mut bob) = session_pair();

        let m0 = alice.encrypt(b"before pickling", &rng).unwrap();
        bob.decrypt(&m0).unwrap();

        let pickled = bob.pickle(b"session pickle key");
        let mut restored = Session::unpickle(&pickled, b"session pickle key").unwrap();
        assert_eq!(restored.session_id(), bob.session_id());

        let m1 = alice.encrypt(b"after pickling", &rng).unwrap();
        assert_eq!(restored.decrypt(&m1).unwrap(), b"after pickling");

        assert!(matches!(
            Session::unpickle(&pickled, b"wrong key"),
            Err(Error::BadMac)
        ));
    }
}

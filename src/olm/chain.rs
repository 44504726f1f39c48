use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::Cipher;

type HmacSha256 = Hmac<Sha256>;

const MESSAGE_KEY_SEED: &[u8] = &[0x01];
const CHAIN_KEY_SEED: &[u8] = &[0x02];

const OLM_KEYS_INFO: &[u8] = b"OLM_KEYS";

fn hmac_step(key: &[u8; 32], seed: &[u8]) -> Box<[u8; 32]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_slice())
        .expect("HMAC-SHA256 accepts a 32-byte key");
    mac.update(seed);

    let mut out = Box::new([0u8; 32]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// A symmetric ratchet chain deriving one message key per index.
///
/// Each step replaces the chain key with `HMAC(CK, 0x02)` after deriving
/// the message key `HMAC(CK, 0x01)`; earlier chain keys are
/// unrecoverable once stepped past.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct ChainKey {
    key: Box<[u8; 32]>,
    index: u32,
}

impl ChainKey {
    pub(crate) fn new(key: Box<[u8; 32]>) -> Self {
        Self { key, index: 0 }
    }

    pub(crate) fn from_parts(key: Box<[u8; 32]>, index: u32) -> Self {
        Self { key, index }
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn key_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Derives the message key at the current index and advances the
    /// chain past it.
    pub(crate) fn create_message_key(&mut self) -> MessageKey {
        let message_key = MessageKey {
            key: hmac_step(&self.key, MESSAGE_KEY_SEED),
            index: self.index,
        };

        self.key = hmac_step(&self.key, CHAIN_KEY_SEED);
        self.index = self.index.wrapping_add(1);

        message_key
    }
}

/// A single-use message key derived from a chain key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct MessageKey {
    key: Box<[u8; 32]>,
    index: u32,
}

impl MessageKey {
    pub(crate) fn from_bytes(key: Box<[u8; 32]>, index: u32) -> Self {
        Self { key, index }
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn key_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Expands the message key into its AES/MAC/IV envelope.
    pub(crate) fn cipher(&self) -> Cipher {
        Cipher::new(self.key.as_slice(), OLM_KEYS_INFO)
    }
}

mod fallback_keys;
mod one_time_keys;

use std::collections::BTreeMap;

use crate::account::fallback_keys::{FallbackKey, FallbackKeys};
use crate::account::one_time_keys::{MAX_ONE_TIME_KEYS, OneTimeKey, OneTimeKeyStore};
use crate::olm::{PreKeyMessage, Session};
use crate::olm::{SessionKeys, Shared3DHSecret};
use crate::pickle::{Decoder, Encoder, Pickleable};
use crate::types::{
    Curve25519Keypair, Curve25519PublicKey, Curve25519SecretKey, Ed25519Keypair, Ed25519PublicKey,
    Ed25519Signature,
};
use crate::{Error, Rng};

const ACCOUNT_PICKLE_VERSION: u32 = 1;

/// The two long-term public keys of an [`Account`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityKeys {
    /// The Curve25519 key used to establish shared secrets.
    pub curve25519: Curve25519PublicKey,
    /// The Ed25519 key used for signing, also called the fingerprint key.
    pub ed25519: Ed25519PublicKey,
}

/// Result of creating an inbound session from a pre-key message.
///
/// The embedded message is decrypted as part of session creation, so the
/// plaintext comes along with the session.
pub struct InboundCreationResult {
    /// The newly established session.
    pub session: Session,
    /// The plaintext of the pre-key message that established it.
    pub plaintext: Vec<u8>,
}

/// A device's long-term cryptographic identity.
///
/// An account holds the Ed25519 signing key, the Curve25519 key used in
/// handshakes, a pool of one-time keys and up to two fallback keys. It
/// mints the one-time keys that peers consume when they open Olm sessions
/// towards this device.
pub struct Account {
    signing_key: Ed25519Keypair,
    diffie_hellman_key: Curve25519Keypair,
    one_time_keys: OneTimeKeyStore,
    fallback_keys: FallbackKeys,
}

impl Account {
    /// Creates a new account with fresh identity keys.
    pub fn new(rng: &Rng) -> Result<Self, Error> {
        Ok(Self {
            signing_key: Ed25519Keypair::new(rng)?,
            diffie_hellman_key: Curve25519Keypair::new(rng)?,
            one_time_keys: OneTimeKeyStore::new(),
            fallback_keys: FallbackKeys::new(),
        })
    }

    /// The public identity keys of this account.
    pub fn identity_keys(&self) -> IdentityKeys {
        IdentityKeys {
            curve25519: self.curve25519_key(),
            ed25519: self.ed25519_key(),
        }
    }

    /// The public Curve25519 identity key.
    pub fn curve25519_key(&self) -> Curve25519PublicKey {
        self.diffie_hellman_key.public_key()
    }

    /// The public Ed25519 signing key.
    pub fn ed25519_key(&self) -> Ed25519PublicKey {
        self.signing_key.public_key()
    }

    /// Signs a message with the account's Ed25519 key.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing_key.sign(message)
    }

    /// The most one-time keys the account will hold at once.
    pub fn max_one_time_keys(&self) -> usize {
        MAX_ONE_TIME_KEYS
    }

    /// Appends `count` fresh one-time keys to the unpublished pool.
    ///
    /// Ids increase monotonically and are never reused. Fails with
    /// [`Error::PoolFull`] when the pool would grow beyond
    /// [`Account::max_one_time_keys`].
    pub fn generate_one_time_keys(&mut self, count: usize, rng: &Rng) -> Result<(), Error> {
        self.one_time_keys.generate(count, rng)
    }

    /// The public halves of every unpublished one-time key, by id.
    pub fn one_time_keys(&self) -> BTreeMap<u32, Curve25519PublicKey> {
        self.one_time_keys.unpublished_public_keys()
    }

    /// Moves every unpublished one-time and fallback key into the
    /// published pool.
    pub fn mark_keys_as_published(&mut self) {
        self.one_time_keys.mark_as_published();
        self.fallback_keys.mark_as_published();
    }

    /// Removes the one-time key with the given public half from either
    /// pool.
    pub fn remove_one_time_key(&mut self, public_key: &Curve25519PublicKey) -> Result<(), Error> {
        self.one_time_keys
            .remove_secret_key(public_key)
            .map(|_| ())
            .ok_or(Error::BadMessageKeyId)
    }

    /// Rotates in a fresh fallback key, keeping the previous one so
    /// in-flight pre-key messages still match.
    ///
    /// Returns the public half of the key that fell out of the two-key
    /// window, if any.
    pub fn generate_fallback_key(
        &mut self,
        rng: &Rng,
    ) -> Result<Option<Curve25519PublicKey>, Error> {
        self.fallback_keys.generate_fallback_key(rng)
    }

    /// The current unpublished fallback key, if any, by id.
    pub fn fallback_key(&self) -> BTreeMap<u32, Curve25519PublicKey> {
        self.fallback_keys
            .unpublished_fallback_key()
            .map(|key| (key.key_id, key.public))
            .into_iter()
            .collect()
    }

    /// Forgets the previous fallback key, returning true if one existed.
    pub fn forget_old_fallback_key(&mut self) -> bool {
        self.fallback_keys.forget_previous_fallback_key()
    }

    /// Opens an outbound session towards a peer, consuming one of the
    /// peer's published one-time keys.
    pub fn create_outbound_session(
        &self,
        their_identity_key: Curve25519PublicKey,
        their_one_time_key: Curve25519PublicKey,
        rng: &Rng,
    ) -> Result<Session, Error> {
        let base_key = Curve25519Keypair::new(rng)?;

        let shared_secret = Shared3DHSecret::new(
            self.diffie_hellman_key.dh(&their_one_time_key),
            base_key.dh(&their_identity_key),
            base_key.dh(&their_one_time_key),
        );

        let session_keys = SessionKeys {
            identity_key: self.curve25519_key(),
            base_key: base_key.public_key(),
            one_time_key: their_one_time_key,
        };

        Ok(Session::new_outbound(shared_secret, session_keys, base_key))
    }

    /// Opens an inbound session from a received pre-key message.
    ///
    /// The embedded ciphertext is decrypted before anything is committed;
    /// a message that fails authentication leaves the account untouched,
    /// so a forged pre-key message cannot burn a one-time key. On success
    /// the consumed one-time key is removed from the account.
    pub fn create_inbound_session(
        &mut self,
        message: &PreKeyMessage,
    ) -> Result<InboundCreationResult, Error> {
        let one_time_key = message.one_time_key();

        let secret = self
            .one_time_keys
            .find_secret_key(&one_time_key)
            .or_else(|| self.fallback_keys.find_secret_key(&one_time_key))
            .ok_or(Error::BadMessageKeyId)?;

        let shared_secret = Shared3DHSecret::new(
            secret.dh(&message.identity_key()),
            self.diffie_hellman_key.dh(&message.base_key()),
            secret.dh(&message.base_key()),
        );

        let session_keys = SessionKeys {
            identity_key: message.identity_key(),
            base_key: message.base_key(),
            one_time_key,
        };

        let mut session =
            Session::new_inbound(shared_secret, session_keys, message.message_ratchet_key());

        let plaintext = session.decrypt_message(message.embedded_message())?;

        // Only a session that proved itself consumes the one-time key;
        // fallback keys deliberately survive to match further messages.
        let _ = self.one_time_keys.remove_secret_key(&one_time_key);

        Ok(InboundCreationResult { session, plaintext })
    }

    /// Like [`Account::create_inbound_session`], additionally asserting
    /// that the message was sent by the given identity key.
    pub fn create_inbound_session_from(
        &mut self,
        their_identity_key: &Curve25519PublicKey,
        message: &PreKeyMessage,
    ) -> Result<InboundCreationResult, Error> {
        if *their_identity_key != message.identity_key() {
            return Err(Error::InvalidInput);
        }

        self.create_inbound_session(message)
    }
}

impl Pickleable for Account {
    fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new(ACCOUNT_PICKLE_VERSION);

        encoder.write_array(&self.signing_key.to_seed());
        encoder.write_array(&self.diffie_hellman_key.secret_key().to_bytes());

        encoder.write_u32(self.one_time_keys.next_key_id);
        encoder.write_u32(self.one_time_keys.count() as u32);
        for (id, key) in &self.one_time_keys.keys {
            encoder.write_u32(*id);
            encoder.write_bool(key.published);
            encoder.write_array(&key.secret.to_bytes());
        }

        encoder.write_u32(self.fallback_keys.next_key_id);
        let fallback_keys = [
            &self.fallback_keys.fallback_key,
            &self.fallback_keys.previous_fallback_key,
        ];
        encoder.write_u8(fallback_keys.iter().filter(|key| key.is_some()).count() as u8);
        for key in fallback_keys.into_iter().flatten() {
            encoder.write_u32(key.key_id);
            encoder.write_bool(key.published);
            encoder.write_array(&key.secret.to_bytes());
        }

        encoder.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut decoder = Decoder::new(bytes, ACCOUNT_PICKLE_VERSION)?;

        let signing_key = Ed25519Keypair::from_seed(decoder.read_array::<32>()?);
        let diffie_hellman_key =
            Curve25519Keypair::from(Curve25519SecretKey::from(decoder.read_boxed_array::<32>()?));

        let next_key_id = decoder.read_u32()?;
        let key_count = decoder.read_u32()? as usize;
        if key_count > MAX_ONE_TIME_KEYS {
            return Err(Error::InvalidField);
        }

        let mut one_time_keys = OneTimeKeyStore::new();
        one_time_keys.next_key_id = next_key_id;
        for _ in 0..key_count {
            let id = decoder.read_u32()?;
            let published = decoder.read_bool()?;
            let secret = Curve25519SecretKey::from(decoder.read_boxed_array::<32>()?);
            let public = secret.public_key();

            one_time_keys.keys.insert(
                id,
                OneTimeKey {
                    secret,
                    public,
                    published,
                },
            );
        }

        let mut fallback_keys = FallbackKeys::new();
        fallback_keys.next_key_id = decoder.read_u32()?;

        let fallback_count = decoder.read_u8()?;
        if fallback_count > 2 {
            return Err(Error::InvalidField);
        }

        let mut decoded_fallback_keys = Vec::with_capacity(fallback_count as usize);
        for _ in 0..fallback_count {
            let key_id = decoder.read_u32()?;
            let published = decoder.read_bool()?;
            let secret = Curve25519SecretKey::from(decoder.read_boxed_array::<32>()?);
            let public = secret.public_key();

            decoded_fallback_keys.push(FallbackKey {
                key_id,
                secret,
                public,
                published,
            });
        }

        let mut decoded_fallback_keys = decoded_fallback_keys.into_iter();
        fallback_keys.fallback_key = decoded_fallback_keys.next();
        fallback_keys.previous_fallback_key = decoded_fallback_keys.next();

        decoder.finish()?;

        Ok(Self {
            signing_key,
            diffie_hellman_key,
            one_time_keys,
            fallback_keys,
        })
    }
}

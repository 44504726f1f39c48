use std::collections::BTreeMap;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::{Curve25519PublicKey, Curve25519SecretKey};
use crate::{Error, Rng};

/// Maximum number of one-time keys an account will hold across both the
/// published and unpublished pools.
pub(crate) const MAX_ONE_TIME_KEYS: usize = 100;

/// A single one-time key with its publication state.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct OneTimeKey {
    pub(crate) secret: Curve25519SecretKey,
    #[zeroize(skip)]
    pub(crate) public: Curve25519PublicKey,
    #[zeroize(skip)]
    pub(crate) published: bool,
}

impl OneTimeKey {
    fn new(rng: &Rng) -> Result<Self, Error> {
        let secret = Curve25519SecretKey::new(rng)?;
        let public = secret.public_key();

        Ok(Self {
            secret,
            public,
            published: false,
        })
    }
}

/// Pool of one-time keys, keyed by a monotonically increasing id.
///
/// Ids are never reused, even after keys are consumed or removed.
pub(crate) struct OneTimeKeyStore {
    pub(crate) keys: BTreeMap<u32, OneTimeKey>,
    pub(crate) next_key_id: u32,
}

impl OneTimeKeyStore {
    pub(crate) fn new() -> Self {
        Self {
            keys: BTreeMap::new(),
            next_key_id: 1,
        }
    }

    /// Generates `count` fresh keys into the unpublished pool.
    pub(crate) fn generate(&mut self, count: usize, rng: &Rng) -> Result<(), Error> {
        if self.keys.len() + count > MAX_ONE_TIME_KEYS {
            return Err(Error::PoolFull);
        }

        for _ in 0..count {
            let id = self.next_key_id;
            self.next_key_id = self.next_key_id.wrapping_add(1);
            self.keys.insert(id, OneTimeKey::new(rng)?);
        }

        Ok(())
    }

    /// Public halves of every key that has not been published yet.
    pub(crate) fn unpublished_public_keys(&self) -> BTreeMap<u32, Curve25519PublicKey> {
        self.keys
            .iter()
            .filter(|(_, key)| !key.published)
            .map(|(id, key)| (*id, key.public))
            .collect()
    }

    pub(crate) fn mark_as_published(&mut self) {
        for key in self.keys.values_mut() {
            key.published = true;
        }
    }

    /// Looks up the secret half of the key with the given public half.
    pub(crate) fn find_secret_key(
        &self,
        public_key: &Curve25519PublicKey,
    ) -> Option<&Curve25519SecretKey> {
        self.keys
            .values()
            .find(|key| key.public == *public_key)
            .map(|key| &key.secret)
    }

    /// Removes the key with the given public half from either pool.
    pub(crate) fn remove_secret_key(&mut self, public_key: &Curve25519PublicKey) -> Option<OneTimeKey> {
        let id = self
            .keys
            .iter()
            .find(|(_, key)| key.public == *public_key)
            .map(|(id, _)| *id)?;

        self.keys.remove(&id)
    }

    pub(crate) fn count(&self) -> usize {
        self.keys.len()
    }
}

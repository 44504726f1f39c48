use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::{Curve25519PublicKey, Curve25519SecretKey};
use crate::{Error, Rng};

/// A fallback key used in place of a one-time key when the published pool
/// has run dry. Unlike a one-time key it may match any number of pre-key
/// messages.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct FallbackKey {
    #[zeroize(skip)]
    pub(crate) key_id: u32,
    pub(crate) secret: Curve25519SecretKey,
    #[zeroize(skip)]
    pub(crate) public: Curve25519PublicKey,
    #[zeroize(skip)]
    pub(crate) published: bool,
}

impl FallbackKey {
    fn new(key_id: u32, rng: &Rng) -> Result<Self, Error> {
        let secret = Curve25519SecretKey::new(rng)?;
        let public = secret.public_key();

        Ok(Self {
            key_id,
            secret,
            public,
            published: false,
        })
    }
}

/// Holds at most two fallback keys: the current one and the previous one,
/// kept around so pre-key messages sent before a rotation still match.
pub(crate) struct FallbackKeys {
    pub(crate) next_key_id: u32,
    pub(crate) fallback_key: Option<FallbackKey>,
    pub(crate) previous_fallback_key: Option<FallbackKey>,
}

impl FallbackKeys {
    pub(crate) fn new() -> Self {
        Self {
            next_key_id: 1,
            fallback_key: None,
            previous_fallback_key: None,
        }
    }

    /// Rotates in a fresh fallback key, returning the public half of the
    /// key that fell out of the window, if any.
    pub(crate) fn generate_fallback_key(
        &mut self,
        rng: &Rng,
    ) -> Result<Option<Curve25519PublicKey>, Error> {
        let id = self.next_key_id;
        let fresh = FallbackKey::new(id, rng)?;
        self.next_key_id = self.next_key_id.wrapping_add(1);

        let removed = self.previous_fallback_key.take();
        self.previous_fallback_key = self.fallback_key.replace(fresh);

        Ok(removed.map(|key| key.public))
    }

    /// The current fallback key, if it has not been published yet.
    pub(crate) fn unpublished_fallback_key(&self) -> Option<&FallbackKey> {
        self.fallback_key
            .as_ref()
            .filter(|key| !key.published)
    }

    pub(crate) fn mark_as_published(&mut self) {
        if let Some(key) = self.fallback_key.as_mut() {
            key.published = true;
        }
    }

    /// Looks up the secret half of either fallback key by its public half.
    pub(crate) fn find_secret_key(
        &self,
        public_key: &Curve25519PublicKey,
    ) -> Option<&Curve25519SecretKey> {
        [&self.fallback_key, &self.previous_fallback_key]
            .into_iter()
            .filter_map(Option::as_ref)
            .find(|key| key.public == *public_key)
            .map(|key| &key.secret)
    }

    /// Forgets the previous fallback key, returning true if one existed.
    pub(crate) fn forget_previous_fallback_key(&mut self) -> bool {
        self.previous_fallback_key.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_keeps_a_two_key_window() {
        let rng = Rng::new();
        let mut keys = FallbackKeys::new();

        assert!(keys.generate_fallback_key(&rng).unwrap().is_none());
        let first = keys.fallback_key.as_ref().unwrap().public;

        assert!(keys.generate_fallback_key(&rng).unwrap().is_none());
        let second = keys.fallback_key.as_ref().unwrap().public;

        // Both the current and the previous key still match.
        assert!(keys.find_secret_key(&first).is_some());
        assert!(keys.find_secret_key(&second).is_some());

        // A third rotation pushes the first key out of the window.
        let removed = keys.generate_fallback_key(&rng).unwrap();
        assert_eq!(removed, Some(first));
        assert!(keys.find_secret_key(&first).is_none());
    }

    #[test]
    fn test_forget_previous_fallback_key() {
        let rng = Rng::new();
        let mut keys = FallbackKeys::new();

        keys.generate_fallback_key(&rng).unwrap();
        keys.generate_fallback_key(&rng).unwrap();

        assert!(keys.forget_previous_fallback_key());
        assert!(!keys.forget_previous_fallback_key());
    }

    #[test]
    fn test_publication_state() {
        let rng = Rng::new();
        let mut keys = FallbackKeys::new();

        keys.generate_fallback_key(&rng).unwrap();
        assert!(keys.unpublished_fallback_key().is_some());

        keys.mark_as_published();
        assert!(keys.unpublished_fallback_key().is_none());
    }
}

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Rng};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const RATCHET_PART_COUNT: usize = 4;
pub(crate) const RATCHET_PART_LENGTH: usize = 32;
/// Total length of the ratchet state in bytes.
pub(crate) const RATCHET_LENGTH: usize = RATCHET_PART_COUNT * RATCHET_PART_LENGTH;

/// The Megolm hash ratchet: four 32-byte parts advanced by a counter.
///
/// Part `j` rolls over once every `2^(8 * (3 - j))` steps; whenever it
/// does, it and every lower-numbered part are rehashed from the highest
/// part that rolled. This structure lets [`MegolmRatchet::advance_to`]
/// reach any later index in O(log N) HMAC computations instead of
/// stepping one index at a time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct MegolmRatchet {
    data: Box<[u8; RATCHET_LENGTH]>,
    counter: u32,
}

impl MegolmRatchet {
    /// Initializes a ratchet at index zero from fresh entropy.
    pub(crate) fn new(rng: &Rng) -> Result<Self, Error> {
        Ok(Self {
            data: rng.random_boxed_array::<RATCHET_LENGTH>()?,
            counter: 0,
        })
    }

    pub(crate) fn from_bytes(data: Box<[u8; RATCHET_LENGTH]>, counter: u32) -> Self {
        Self { data, counter }
    }

    pub(crate) fn counter(&self) -> u32 {
        self.counter
    }

    pub(crate) fn as_bytes(&self) -> &[u8; RATCHET_LENGTH] {
        &self.data
    }

    /// `data[to] = HMAC(data[from], to)`, the single-byte part number
    /// acting as the seed.
    fn rehash_part(&mut self, from: usize, to: usize) {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(
            &self.data[from * RATCHET_PART_LENGTH..(from + 1) * RATCHET_PART_LENGTH],
        )
        .expect("HMAC-SHA256 accepts a 32-byte key");
        mac.update(&[to as u8]);

        self.data[to * RATCHET_PART_LENGTH..(to + 1) * RATCHET_PART_LENGTH]
            .copy_from_slice(&mac.finalize().into_bytes());
    }

    /// Advances the ratchet by a single step.
    pub(crate) fn advance(&mut self) {
        let mut mask: u32 = 0x00ff_ffff;
        let mut h = 0;

        self.counter = self.counter.wrapping_add(1);

        // The highest part whose low bits all rolled over determines how
        // much of the state needs rehashing.
        while h < RATCHET_PART_COUNT {
            if self.counter & mask == 0 {
                break;
            }
            h += 1;
            mask >>= 8;
        }

        // Update R(h)...R(3) from the old value of R(h); R(h) itself is
        // rewritten last so every part keys off the pre-advance state.
        for part in (h..RATCHET_PART_COUNT).rev() {
            self.rehash_part(h, part);
        }
    }

    /// Fast-forwards the ratchet to the given index.
    ///
    /// Equivalent to calling [`MegolmRatchet::advance`] in a loop, but
    /// rehashes each part at most 256 times regardless of the distance.
    pub(crate) fn advance_to(&mut self, advance_to: u32) {
        for part in 0..RATCHET_PART_COUNT {
            let shift = ((RATCHET_PART_COUNT - part - 1) * 8) as u32;
            let mask: u32 = !0u32 << shift;

            // The '& 0xff' handles advances of a whole multiple of this
            // part's period.
            let mut steps = ((advance_to >> shift).wrapping_sub(self.counter >> shift)) & 0xff;

            if steps == 0 {
                // The counter can be slightly ahead of the target within
                // this part after a higher part was rewritten; a full
                // cycle of this part is then the correct distance.
                if advance_to < self.counter {
                    steps = 0x100;
                } else {
                    continue;
                }
            }

            self.counter = advance_to & mask;

            // All but the last step only touch this part.
            while steps > 1 {
                self.rehash_part(part, part);
                steps -= 1;
            }

            // The last step cascades into every lower part.
            for lower in (part..RATCHET_PART_COUNT).rev() {
                self.rehash_part(part, lower);
            }
        }

        self.counter = advance_to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratchet_with_seed(seed: u8) -> MegolmRatchet {
        MegolmRatchet::from_bytes(Box::new([seed; RATCHET_LENGTH]), 0)
    }

    #[test]
    fn test_advance_changes_state_and_counter() {
        let mut ratchet = ratchet_with_seed(1);
        let initial = *ratchet.as_bytes();

        ratchet.advance();

        assert_eq!(ratchet.counter(), 1);
        assert_ne!(ratchet.as_bytes(), &initial);
    }

    #[test]
    fn test_advance_to_matches_single_steps() {
        for target in [1u32, 2, 5, 127, 128, 255, 256, 257, 511, 513, 1024] {
            let mut stepped = ratchet_with_seed(3);
            for _ in 0..target {
                stepped.advance();
            }

            let mut jumped = ratchet_with_seed(3);
            jumped.advance_to(target);

            assert_eq!(jumped.counter(), stepped.counter());
            assert_eq!(jumped.as_bytes(), stepped.as_bytes(), "target {target}");
        }
    }

    #[test]
    fn test_advance_to_from_intermediate_state() {
        let mut stepped = ratchet_with_seed(7);
        for _ in 0..300 {
            stepped.advance();
        }

        let mut jumped = ratchet_with_seed(7);
        jumped.advance_to(130);
        jumped.advance_to(300);

        assert_eq!(jumped.as_bytes(), stepped.as_bytes());
    }

    #[test]
    fn test_advancing_is_deterministic() {
        let mut a = ratchet_with_seed(9);
        let mut b = ratchet_with_seed(9);

        a.advance_to(1000);
        b.advance_to(1000);

        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}

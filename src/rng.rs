use std::sync::Mutex;

use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{SeedableRng, TryRngCore};

use crate::Error;

/// Cryptographically secure random number generator backing all key
/// generation in the crate.
///
/// The generator is injected into every operation that needs entropy, so
/// a caller controls where randomness comes from. The default instance
/// seeds itself from the operating system; [`Rng::from_seed`] produces a
/// deterministic instance for tests and vectors. A generator that cannot
/// produce the requested bytes fails with [`Error::NotEnoughRandom`] —
/// entropy is never silently substituted.
#[derive(Debug)]
pub struct Rng {
    inner: Mutex<ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            inner: Mutex::new(ChaCha20Rng::from_os_rng()),
        }
    }
}

impl Rng {
    /// Creates a new OS-seeded generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deterministic generator from a fixed seed.
    ///
    /// Every instance built from the same seed yields the same byte
    /// stream. Only suitable for tests and reproducible vectors.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            inner: Mutex::new(ChaCha20Rng::from_seed(seed)),
        }
    }

    /// Fills a fixed-size array with random bytes.
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Fills a boxed fixed-size array, keeping the bytes off the stack.
    pub fn random_boxed_array<const N: usize>(&self) -> Result<Box<[u8; N]>, Error> {
        let mut out = Box::new([0u8; N]);
        self.fill(out.as_mut_slice())?;
        Ok(out)
    }

    /// Produces `len` random bytes.
    pub fn random_vec(&self, len: usize) -> Result<Vec<u8>, Error> {
        let mut out = vec![0u8; len];
        self.fill(&mut out)?;
        Ok(out)
    }

    fn fill(&self, out: &mut [u8]) -> Result<(), Error> {
        let mut rng = self.inner.lock().map_err(|_| Error::NotEnoughRandom)?;
        rng.try_fill_bytes(out).map_err(|_| Error::NotEnoughRandom)
    }
}

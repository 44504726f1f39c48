//! Passphrase-encrypted, self-authenticating serialization of component
//! state.
//!
//! A pickle is `Base64(AES-256-CBC(state) || HMAC-SHA-256[..8])`, keyed by
//! expanding the passphrase with HKDF-SHA-256 under the `"Pickle"` info
//! string. The MAC is checked in constant time before any byte of the
//! plaintext is parsed.

use zeroize::Zeroize;

use crate::Error;
use crate::base64::{base64_decode, base64_encode};
use crate::cipher::{Cipher, MAC_TRUNCATED_LENGTH};

const PICKLE_INFO: &[u8] = b"Pickle";

/// Serialization of a component's state for at-rest persistence.
///
/// `encode`/`decode` define the component's plaintext field layout; the
/// provided `pickle`/`unpickle` wrap it in the authenticated encryption
/// envelope.
pub trait Pickleable: Sized {
    /// Serializes the component's state, including its version prefix.
    fn encode(&self) -> Vec<u8>;

    /// Rebuilds the component from a decrypted plaintext.
    fn decode(bytes: &[u8]) -> Result<Self, Error>;

    /// Serializes and encrypts the component under a passphrase.
    fn pickle(&self, key: &[u8]) -> String {
        let cipher = Cipher::new(key, PICKLE_INFO);

        let mut plaintext = self.encode();
        let mut ciphertext = cipher.encrypt(&plaintext);
        plaintext.zeroize();

        let mac = cipher.truncated_mac(&ciphertext);
        ciphertext.extend_from_slice(&mac);

        base64_encode(&ciphertext)
    }

    /// Decrypts and rebuilds a component pickled under a passphrase.
    fn unpickle(pickled: &str, key: &[u8]) -> Result<Self, Error> {
        let decoded = base64_decode(pickled)?;
        if decoded.len() < MAC_TRUNCATED_LENGTH {
            return Err(Error::InvalidInput);
        }

        let (ciphertext, mac) = decoded.split_at(decoded.len() - MAC_TRUNCATED_LENGTH);

        let cipher = Cipher::new(key, PICKLE_INFO);
        if !cipher.verify_truncated_mac(ciphertext, mac) {
            return Err(Error::BadMac);
        }

        let mut plaintext = cipher.decrypt(ciphertext)?;
        let result = Self::decode(&plaintext);
        plaintext.zeroize();

        result
    }
}

/// Field writer for pickle plaintexts.
///
/// The version number leads the blob big-endian; every integer field after
/// it is little-endian.
pub(crate) struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    pub(crate) fn new(version: u32) -> Self {
        Self {
            buffer: version.to_be_bytes().to_vec(),
        }
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub(crate) fn write_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    pub(crate) fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_array(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Field reader mirroring [`Encoder`].
pub(crate) struct Decoder<'a> {
    bytes: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Starts decoding, checking the leading version number.
    pub(crate) fn new(bytes: &'a [u8], expected_version: u32) -> Result<Self, Error> {
        if bytes.len() < 4 {
            return Err(Error::TooShort);
        }

        let (version, rest) = bytes.split_at(4);
        if version != expected_version.to_be_bytes() {
            return Err(Error::BadVersion);
        }

        Ok(Self { bytes: rest })
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        let (&byte, rest) = self.bytes.split_first().ok_or(Error::TooShort)?;
        self.bytes = rest;
        Ok(byte)
    }

    pub(crate) fn read_bool(&mut self) -> Result<bool, Error> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::InvalidField),
        }
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        if self.bytes.len() < N {
            return Err(Error::TooShort);
        }

        let (bytes, rest) = self.bytes.split_at(N);
        self.bytes = rest;

        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub(crate) fn read_boxed_array<const N: usize>(&mut self) -> Result<Box<[u8; N]>, Error> {
        if self.bytes.len() < N {
            return Err(Error::TooShort);
        }

        let (bytes, rest) = self.bytes.split_at(N);
        self.bytes = rest;

        let mut out = Box::new([0u8; N]);
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Asserts that every byte of the plaintext was consumed.
    pub(crate) fn finish(self) -> Result<(), Error> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidField)
        }
    }
}

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Number of MAC bytes carried on the wire.
pub(crate) const MAC_TRUNCATED_LENGTH: usize = 8;

const EXPANDED_LENGTH: usize = 80;

/// AES-256-CBC + HMAC-SHA-256 envelope keyed from a single chunk of key
/// material.
///
/// The key material is expanded with HKDF-SHA-256 (zero salt) into
/// `aes_key(32) || mac_key(32) || iv(16)`. Olm message keys, Megolm
/// ratchet states, PK shared secrets and pickle passphrases all pass
/// through here, distinguished only by the HKDF info string.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Cipher {
    aes_key: Box<[u8; 32]>,
    mac_key: Box<[u8; 32]>,
    iv: Box<[u8; 16]>,
}

impl Cipher {
    pub(crate) fn new(key_material: &[u8], info: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, key_material);

        let mut expanded = Box::new([0u8; EXPANDED_LENGTH]);
        hkdf.expand(info, expanded.as_mut_slice())
            .expect("80 bytes is a valid HKDF-SHA256 output length");

        let mut aes_key = Box::new([0u8; 32]);
        let mut mac_key = Box::new([0u8; 32]);
        let mut iv = Box::new([0u8; 16]);

        aes_key.copy_from_slice(&expanded[0..32]);
        mac_key.copy_from_slice(&expanded[32..64]);
        iv.copy_from_slice(&expanded[64..80]);
        expanded.zeroize();

        Self {
            aes_key,
            mac_key,
            iv,
        }
    }

    /// Encrypts a plaintext with PKCS#7 padding.
    pub(crate) fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes256CbcEnc::new_from_slices(self.aes_key.as_slice(), self.iv.as_slice())
            .expect("AES-256-CBC accepts a 32-byte key and a 16-byte IV")
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypts a ciphertext, stripping PKCS#7 padding.
    ///
    /// Callers verify the MAC before decrypting, so a padding failure here
    /// means the ciphertext itself is malformed.
    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        Aes256CbcDec::new_from_slices(self.aes_key.as_slice(), self.iv.as_slice())
            .expect("AES-256-CBC accepts a 32-byte key and a 16-byte IV")
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::InvalidInput)
    }

    /// Computes the truncated HMAC-SHA-256 tag over a message.
    pub(crate) fn truncated_mac(&self, message: &[u8]) -> [u8; MAC_TRUNCATED_LENGTH] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.mac_key.as_slice())
            .expect("HMAC-SHA256 accepts a 32-byte key");
        mac.update(message);
        let full = mac.finalize().into_bytes();

        let mut truncated = [0u8; MAC_TRUNCATED_LENGTH];
        truncated.copy_from_slice(&full[0..MAC_TRUNCATED_LENGTH]);
        truncated
    }

    /// Compares a received truncated MAC in constant time.
    pub(crate) fn verify_truncated_mac(&self, message: &[u8], expected: &[u8]) -> bool {
        let computed = self.truncated_mac(message);
        bool::from(computed.ct_eq(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = Cipher::new(&[1u8; 32], b"OLM_KEYS");

        let ciphertext = cipher.encrypt(b"a secret payload");
        assert_ne!(ciphertext.as_slice(), b"a secret payload".as_slice());

        let plaintext = cipher.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, b"a secret payload");
    }

    #[test]
    fn test_different_info_yields_different_keys() {
        let olm = Cipher::new(&[1u8; 32], b"OLM_KEYS");
        let megolm = Cipher::new(&[1u8; 32], b"MEGOLM_KEYS");

        assert_ne!(olm.encrypt(b"payload"), megolm.encrypt(b"payload"));
    }

    #[test]
    fn test_truncated_mac_verification() {
        let cipher = Cipher::new(&[2u8; 32], b"Pickle");
        let mac = cipher.truncated_mac(b"authenticated bytes");

        assert!(cipher.verify_truncated_mac(b"authenticated bytes", &mac));
        assert!(!cipher.verify_truncated_mac(b"different bytes", &mac));
    }

    #[test]
    fn test_empty_plaintext_round_trip() {
        let cipher = Cipher::new(&[3u8; 32], b"");
        let ciphertext = cipher.encrypt(b"");

        // PKCS#7 always emits at least one full block.
        assert_eq!(ciphertext.len(), 16);
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), b"");
    }
}

use crate::Error;
use crate::base64::{base64_decode, base64_encode};
use crate::cipher::MAC_TRUNCATED_LENGTH;
use crate::types::Curve25519PublicKey;
use crate::wire::{Reader, encode_bytes, encode_integer};

const VERSION: u8 = 3;

const RATCHET_KEY_TAG: u8 = 0x0a;
const COUNTER_TAG: u8 = 0x10;
const CIPHERTEXT_TAG: u8 = 0x22;

const ONE_TIME_KEY_TAG: u8 = 0x0a;
const BASE_KEY_TAG: u8 = 0x12;
const IDENTITY_KEY_TAG: u8 = 0x1a;
const MESSAGE_TAG: u8 = 0x22;

/// An ordinary (post-handshake) Olm message.
///
/// On the wire: `version || ratchet_key || counter || ciphertext || mac`,
/// where the truncated MAC covers every byte before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub(crate) ratchet_key: Curve25519PublicKey,
    pub(crate) counter: u32,
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) mac: [u8; MAC_TRUNCATED_LENGTH],
}

impl Message {
    /// Serializes the MAC-covered prefix of a message.
    pub(crate) fn encode_prefix(
        ratchet_key: &Curve25519PublicKey,
        counter: u32,
        ciphertext: &[u8],
    ) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(ciphertext.len() + 48);
        buffer.push(VERSION);
        encode_bytes(&mut buffer, RATCHET_KEY_TAG, ratchet_key.as_bytes());
        encode_integer(&mut buffer, COUNTER_TAG, u64::from(counter));
        encode_bytes(&mut buffer, CIPHERTEXT_TAG, ciphertext);
        buffer
    }

    /// The bytes the truncated MAC authenticates.
    pub(crate) fn to_mac_bytes(&self) -> Vec<u8> {
        Self::encode_prefix(&self.ratchet_key, self.counter, &self.ciphertext)
    }

    /// Serializes the full message including its MAC.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_mac_bytes();
        bytes.extend_from_slice(&self.mac);
        bytes
    }

    /// Parses a message, enforcing the fixed field order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        match reader.read_byte() {
            Ok(VERSION) => {}
            Ok(_) => return Err(Error::BadVersion),
            Err(_) => return Err(Error::InvalidInput),
        }

        let mut mac = [0u8; MAC_TRUNCATED_LENGTH];
        mac.copy_from_slice(reader.split_off_suffix(MAC_TRUNCATED_LENGTH)?);

        let ratchet_key = reader.expect_fixed_bytes::<32>(RATCHET_KEY_TAG)?;
        let counter = reader.expect_integer(COUNTER_TAG)?;
        let counter = u32::try_from(counter).map_err(|_| Error::BadMessageFormat)?;
        let ciphertext = reader.expect_bytes(CIPHERTEXT_TAG)?.to_vec();

        if reader.remaining() != 0 {
            return Err(Error::BadMessageFormat);
        }

        Ok(Self {
            ratchet_key: Curve25519PublicKey::from(ratchet_key),
            counter,
            ciphertext,
            mac,
        })
    }

    /// Encodes the message as unpadded base64 for the caller boundary.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Decodes a message from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        Self::from_bytes(&base64_decode(input)?)
    }
}

/// The first message of an Olm session, carrying the handshake keys next
/// to an embedded ordinary message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreKeyMessage {
    pub(crate) one_time_key: Curve25519PublicKey,
    pub(crate) base_key: Curve25519PublicKey,
    pub(crate) identity_key: Curve25519PublicKey,
    pub(crate) message: Message,
}

impl PreKeyMessage {
    /// The one-time key of the receiver this session was built against.
    pub fn one_time_key(&self) -> Curve25519PublicKey {
        self.one_time_key
    }

    /// The ephemeral base key the sender generated for the handshake.
    pub fn base_key(&self) -> Curve25519PublicKey {
        self.base_key
    }

    /// The long-term identity key of the sender.
    pub fn identity_key(&self) -> Curve25519PublicKey {
        self.identity_key
    }

    /// The ratchet key of the embedded message, seeding the responder's
    /// first receiver chain.
    pub(crate) fn message_ratchet_key(&self) -> Curve25519PublicKey {
        self.message.ratchet_key
    }

    pub(crate) fn embedded_message(&self) -> &Message {
        &self.message
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let message = self.message.to_bytes();

        let mut buffer = Vec::with_capacity(message.len() + 110);
        buffer.push(VERSION);
        encode_bytes(&mut buffer, ONE_TIME_KEY_TAG, self.one_time_key.as_bytes());
        encode_bytes(&mut buffer, BASE_KEY_TAG, self.base_key.as_bytes());
        encode_bytes(&mut buffer, IDENTITY_KEY_TAG, self.identity_key.as_bytes());
        encode_bytes(&mut buffer, MESSAGE_TAG, &message);
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        match reader.read_byte() {
            Ok(VERSION) => {}
            Ok(_) => return Err(Error::BadVersion),
            Err(_) => return Err(Error::InvalidInput),
        }

        let one_time_key = reader.expect_fixed_bytes::<32>(ONE_TIME_KEY_TAG)?;
        let base_key = reader.expect_fixed_bytes::<32>(BASE_KEY_TAG)?;
        let identity_key = reader.expect_fixed_bytes::<32>(IDENTITY_KEY_TAG)?;
        let message = reader.expect_bytes(MESSAGE_TAG)?;

        if reader.remaining() != 0 {
            return Err(Error::BadMessageFormat);
        }

        Ok(Self {
            one_time_key: Curve25519PublicKey::from(one_time_key),
            base_key: Curve25519PublicKey::from(base_key),
            identity_key: Curve25519PublicKey::from(identity_key),
            message: Message::from_bytes(message)?,
        })
    }

    /// Encodes the message as unpadded base64 for the caller boundary.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Decodes a message from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        Self::from_bytes(&base64_decode(input)?)
    }
}

/// Either kind of Olm message, tagged the way the caller boundary
/// transmits them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OlmMessage {
    /// A pre-key message establishing a new session (type 0).
    PreKey(PreKeyMessage),
    /// An ordinary message on an established session (type 1).
    Normal(Message),
}

impl OlmMessage {
    /// The numeric message type transmitted next to the ciphertext.
    pub fn message_type(&self) -> usize {
        match self {
            Self::PreKey(_) => 0,
            Self::Normal(_) => 1,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::PreKey(message) => message.to_bytes(),
            Self::Normal(message) => message.to_bytes(),
        }
    }

    /// Encodes the message as unpadded base64 for the caller boundary.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Reassembles a message from the transmitted `(type, base64)` pair.
    pub fn from_parts(message_type: usize, ciphertext: &str) -> Result<Self, Error> {
        let bytes = base64_decode(ciphertext)?;

        match message_type {
            0 => Ok(Self::PreKey(PreKeyMessage::from_bytes(&bytes)?)),
            1 => Ok(Self::Normal(Message::from_bytes(&bytes)?)),
            _ => Err(Error::InvalidInput),
        }
    }
}

impl From<PreKeyMessage> for OlmMessage {
    fn from(message: PreKeyMessage) -> Self {
        Self::PreKey(message)
    }
}

impl From<Message> for OlmMessage {
    fn from(message: Message) -> Self {
        Self::Normal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_message() -> Message {
        Message {
            ratchet_key: Curve25519PublicKey::from([0x11; 32]),
            counter: 5,
            ciphertext: vec![0xde, 0xad, 0xbe, 0xef],
            mac: [0xaa; MAC_TRUNCATED_LENGTH],
        }
    }

    #[test]
    fn test_message_round_trip() {
        let message = test_message();
        let decoded = Message::from_bytes(&message.to_bytes()).unwrap();

        assert_eq!(decoded.ratchet_key, message.ratchet_key);
        assert_eq!(decoded.counter, message.counter);
        assert_eq!(decoded.ciphertext, message.ciphertext);
        assert_eq!(decoded.mac, message.mac);
    }

    #[test]
    fn test_message_wire_layout() {
        let message = test_message();
        let bytes = message.to_bytes();

        assert_eq!(bytes[0], 0x03);
        assert_eq!(bytes[1], 0x0a);
        assert_eq!(bytes[2], 32);
        assert_eq!(&bytes[3..35], &[0x11; 32]);
        assert_eq!(bytes[35], 0x10);
        assert_eq!(bytes[36], 5);
        assert_eq!(bytes[37], 0x22);
        assert_eq!(bytes[38], 4);
        assert_eq!(&bytes[39..43], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(&bytes[43..], &[0xaa; 8]);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut bytes = test_message().to_bytes();
        bytes[0] = 0x04;
        assert_eq!(Message::from_bytes(&bytes), Err(Error::BadVersion));
    }

    #[test]
    fn test_truncated_message_is_rejected() {
        let bytes = test_message().to_bytes();
        assert_eq!(
            Message::from_bytes(&bytes[..bytes.len() - 10]),
            Err(Error::BadMessageFormat)
        );
    }

    #[test]
    fn test_pre_key_round_trip() {
        let pre_key = PreKeyMessage {
            one_time_key: Curve25519PublicKey::from([0x01; 32]),
            base_key: Curve25519PublicKey::from([0x02; 32]),
            identity_key: Curve25519PublicKey::from([0x03; 32]),
            message: test_message(),
        };

        let decoded = PreKeyMessage::from_bytes(&pre_key.to_bytes()).unwrap();
        assert_eq!(decoded.one_time_key, pre_key.one_time_key);
        assert_eq!(decoded.base_key, pre_key.base_key);
        assert_eq!(decoded.identity_key, pre_key.identity_key);
        assert_eq!(decoded.message.ciphertext, pre_key.message.ciphertext);
    }

    #[test]
    fn test_olm_message_parts_round_trip() {
        let message = OlmMessage::Normal(test_message());

        let restored =
            OlmMessage::from_parts(message.message_type(), &message.to_base64()).unwrap();
        assert_eq!(restored.message_type(), 1);
        assert_eq!(restored.to_bytes(), message.to_bytes());
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let encoded = OlmMessage::Normal(test_message()).to_base64();
        assert_eq!(
            OlmMessage::from_parts(2, &encoded).unwrap_err(),
            Error::InvalidInput
        );
    }
}

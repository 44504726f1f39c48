/// Errors that can occur during Olm/Megolm protocol operations.
///
/// Every failure leaves the object it was called on in the state it held
/// before the call; only successful operations advance ratchet state.
#[derive(thiserror::Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error {
    /// An input was empty, had the wrong length, or was malformed base64.
    #[error("Invalid input")]
    InvalidInput,

    /// A message or pickle carried an unknown version marker.
    #[error("Unknown version")]
    BadVersion,

    /// The tag/length framing of a message was violated.
    #[error("Malformed message framing")]
    BadMessageFormat,

    /// The truncated MAC of an Olm or PK message did not match.
    #[error("Message authentication failed")]
    BadMessageMac,

    /// An Ed25519 signature did not verify.
    #[error("Signature verification failed")]
    BadSignature,

    /// The MAC of a pickle did not match the supplied key.
    #[error("Pickle authentication failed")]
    BadMac,

    /// A Megolm message index is unreachable from any known ratchet state.
    #[error("Unknown message index")]
    UnknownMessageIndex,

    /// Decrypting would require skipping more message keys than the
    /// session is allowed to cache.
    #[error("Message index too far ahead of the receiver chain")]
    MessageIndexTooFar,

    /// A session state carried more receiver chains than the protocol
    /// allows.
    #[error("Too many receiver chains")]
    TooManyChains,

    /// No one-time key with the given public part exists in the account.
    #[error("Unknown one-time key")]
    BadMessageKeyId,

    /// The one-time key pool is at capacity.
    #[error("One-time key pool is full")]
    PoolFull,

    /// The random number generator produced fewer bytes than requested.
    #[error("Not enough randomness available")]
    NotEnoughRandom,

    /// The operation was called on a handle that has been released.
    #[error("Handle has already been released")]
    AlreadyReleased,

    /// A pickle ended before all declared fields were read.
    #[error("Pickle data is truncated")]
    TooShort,

    /// A pickle field held a value that cannot be represented.
    #[error("Pickle field is invalid")]
    InvalidField,
}

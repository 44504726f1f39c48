//! An implementation of the Olm and Megolm cryptographic ratchets.
//!
//! The crate provides the core state machines of an end-to-end
//! encryption stack:
//!
//! - [`Account`]: long-term identity keys plus the one-time and fallback
//!   key pools peers consume to open sessions.
//! - [`Session`]: the one-to-one double ratchet, established through a
//!   triple Diffie-Hellman pre-key handshake.
//! - [`GroupSession`] / [`InboundGroupSession`]: the one-to-many group
//!   ratchet with O(log N) fast-forward and signed ciphertexts.
//! - [`PkEncryption`] / [`PkDecryption`]: an asymmetric envelope towards
//!   a single recipient key.
//! - [`Utility`]: signature verification and hashing helpers.
//!
//! Every component serializes through the [`Pickleable`] trait into a
//! passphrase-encrypted, self-authenticating pickle, and can be wrapped
//! in a [`Handle`] when a binding layer needs an explicit release
//! lifecycle. Randomness is always injected through [`Rng`]; no
//! operation touches ambient entropy sources on its own.

mod base64;
mod cipher;
mod wire;

mod error;
pub use error::Error;

mod rng;
pub use rng::Rng;

mod types;
pub use types::*;

mod pickle;
pub use pickle::Pickleable;

mod account;
pub use account::{Account, IdentityKeys, InboundCreationResult};

mod olm;
pub use olm::{Message, OlmMessage, PreKeyMessage, Session};

mod megolm;
pub use megolm::{ExportedSessionKey, GroupSession, InboundGroupSession, MegolmMessage, SessionKey};

mod pk;
pub use pk::{PkDecryption, PkEncryption, PkMessage};

mod utility;
pub use utility::Utility;

mod handle;
pub use handle::Handle;

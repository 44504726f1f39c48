mod ed25519;
mod x25519;

pub use ed25519::{Ed25519Keypair, Ed25519PublicKey, Ed25519Signature};
pub use x25519::{Curve25519Keypair, Curve25519PublicKey, Curve25519SecretKey};

//! # Knot Cryptography
//!
//! Cryptographic primitives used by Knot participants:
//! - Ed25519 keypairs implementing `EventSigner`
//! - `Ed25519Verifier`, the default `SignatureVerifier`
//! - BLAKE3 key derivation for deterministic keys
//!
//! | Function | Algorithm | Size |
//! |----------|-----------|------|
//! | Signatures | Ed25519 | 64 bytes |
//! | Key derivation | BLAKE3 | 256-bit |

pub mod error;
pub mod hash;
pub mod keys;
pub mod verify;

pub use error::*;
pub use hash::*;
pub use keys::*;
pub use verify::*;

/// Cryptographic prelude
pub mod prelude {
    pub use crate::error::{CryptoError, Result};
    pub use crate::hash::derive_key;
    pub use crate::keys::KeyPair;
    pub use crate::verify::Ed25519Verifier;
}

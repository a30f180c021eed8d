//! Key management for Knot participants

use crate::error::{CryptoError, Result};
use crate::hash::derive_key;
use ed25519_dalek::{Signer, SigningKey};
use knot_core::{CreatorId, EventSigner, Signature};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

/// Ed25519 keypair of a consensus participant
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut secret = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut secret[..]);
        Self::from_secret(&secret)
    }

    /// Build from 32 secret bytes
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Deterministic keypair for a labelled index (simulations and tests)
    pub fn derive(context: &str, index: u64) -> Self {
        let secret = Zeroizing::new(derive_key(context, &index.to_be_bytes()));
        Self::from_secret(&secret)
    }

    /// Parse a hex-encoded secret key
    pub fn from_secret_hex(s: &str) -> Result<Self> {
        let bytes = Zeroizing::new(hex::decode(s.trim())?);
        let secret: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidSecretKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        let secret = Zeroizing::new(secret);
        Ok(Self::from_secret(&secret))
    }

    /// Hex-encoded secret key, wiped from memory on drop
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.to_bytes()))
    }

    /// Raw public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Participant id derived from the public key
    pub fn creator_id(&self) -> CreatorId {
        CreatorId::from_public_key(self.public_key())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }
}

impl EventSigner for KeyPair {
    fn creator_id(&self) -> CreatorId {
        KeyPair::creator_id(self)
    }

    fn sign(&self, message: &[u8]) -> Signature {
        KeyPair::sign(self, message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({})", self.creator_id())
    }
}

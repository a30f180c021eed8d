//! Signature verification keyed by creator id
//!
//! A `CreatorId` carries the creator's Ed25519 public key, so the lookup
//! `CreatorId -> PublicKey` is a decode rather than a registry query.

use crate::error::{CryptoError, Result};
use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};
use knot_core::{CreatorId, Signature, SignatureVerifier};

/// Default verifier for events signed with Ed25519
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Public key of a creator
    pub fn public_key_of(creator: &CreatorId) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(creator.as_bytes())
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Verify, reporting why a check failed
    pub fn check(creator: &CreatorId, message: &[u8], signature: &Signature) -> Result<()> {
        let key = Self::public_key_of(creator)?;
        let sig = Ed25519Signature::from_bytes(signature.as_bytes());
        key.verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, creator: &CreatorId, message: &[u8], signature: &Signature) -> bool {
        Self::check(creator, message, signature).is_ok()
    }
}

//! BLAKE3 key derivation

/// Derive 32 bytes of key material from a context string and seed
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    blake3::derive_key(context, key_material)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_separates_contexts() {
        let seed = [9u8; 32];
        assert_ne!(derive_key("knot.a", &seed), derive_key("knot.b", &seed));
    }
}

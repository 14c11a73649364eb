//! Per-message key derivation using HKDF.

use hkdf::Hkdf;
use sha2::Sha256;

/// Label used for message key derivation.
const MESSAGE_KEY_LABEL: &[u8] = b"veilMessageKeyV1";

/// Derive the one-time key for a single message.
///
/// Produces a 256-bit AEAD key unique to (shared secret, counter). The
/// counter travels in the clear inside the envelope; it is derivation
/// context, not secret.
///
/// # Security
///
/// - Counter values are strictly increasing per [`crate::KeyMaterial`], so a
///   derivation context is never reused under one shared secret
/// - Deterministic: the receiver re-derives the same key from the envelope's
///   counter
pub fn derive_message_key(shared_secret: &[u8; 32], counter: u64) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);

    // Build the info parameter: label || counter
    // Capacity: 16 (label) + 8 (counter) = 24
    let mut info = Vec::with_capacity(24);
    info.extend_from_slice(MESSAGE_KEY_LABEL);
    info.extend_from_slice(&counter.to_be_bytes());

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(&info, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let secret = [0x42u8; 32];
        assert_eq!(derive_message_key(&secret, 7), derive_message_key(&secret, 7));
    }

    #[test]
    fn different_counters_produce_different_keys() {
        let secret = [0x42u8; 32];
        assert_ne!(derive_message_key(&secret, 1), derive_message_key(&secret, 2));
    }

    #[test]
    fn different_secrets_produce_different_keys() {
        assert_ne!(derive_message_key(&[1u8; 32], 1), derive_message_key(&[2u8; 32], 1));
    }

    #[test]
    fn derived_key_differs_from_secret() {
        let secret = [0x42u8; 32];
        assert_ne!(derive_message_key(&secret, 1), secret);
    }

    #[test]
    fn counter_boundary_values() {
        let secret = [0u8; 32];
        let _ = derive_message_key(&secret, 0);
        let _ = derive_message_key(&secret, u64::MAX);
    }
}

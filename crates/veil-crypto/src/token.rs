//! Connection-token codec.
//!
//! The token is the key-bearing half of the shareable credential
//! (`<rendezvous-address>:<token>`). Three formats exist; decoding walks
//! them in order and succeeds on the first match:
//!
//! 1. Compact: `public_key(32) || symmetric_key(32)`, DEFLATE-compressed,
//!    URL-safe base64 with `=` padding stripped for transcription.
//! 2. Legacy PEM: a PEM public key, a `|` delimiter, then the base64url
//!    symmetric key.
//! 3. Legacy key-only: the base64url symmetric key alone.
//!
//! Decoding a format that carries a public key generates a fresh local key
//! pair and performs one Diffie-Hellman exchange, so the resulting
//! [`KeyMaterial`] holds a shared secret that differs on every decode
//! (one-sided ephemeral exchange). The bundled symmetric key is always
//! retained as the fallback-mode key. A failed decode leaves no partial
//! state; it either returns complete material or an error.

use std::io::Read;

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE},
};
use flate2::{
    Compression,
    read::{DeflateDecoder, DeflateEncoder},
};
use x25519_dalek::PublicKey;

use crate::{DecodeError, KeyMaterial, KeyPair};

/// Decompressed compact payload: 32-byte public key + 32-byte symmetric key.
const COMPACT_PAYLOAD_SIZE: usize = 64;

/// Key width for both halves of the compact payload.
const KEY_SIZE: usize = 32;

/// Separator between the PEM block and the key in the legacy format.
const PEM_DELIMITER: char = '|';

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// Encode key material into a connection token.
///
/// Emits the compact format when the material holds a key pair, the legacy
/// key-only format otherwise. Not idempotent across material instances: the
/// key pair is fresh per process, so two processes never emit the same
/// token for the same symmetric key.
pub fn encode(material: &KeyMaterial) -> String {
    match material.key_pair() {
        Some(pair) => encode_compact(pair.public(), material.symmetric_key()),
        None => URL_SAFE.encode(material.symmetric_key()),
    }
}

/// Decode a connection token into negotiated key material.
///
/// Attempts compact first, then the legacy formats. All failures collapse
/// into a single recoverable [`DecodeError::InvalidFormat`]; the caller
/// re-prompts for the string.
pub fn decode(token: &str) -> Result<KeyMaterial, DecodeError> {
    let trimmed = token.trim();
    decode_compact(trimmed)
        .or_else(|_| decode_legacy_pem(trimmed))
        .or_else(|_| decode_legacy_key(trimmed))
        .map_err(|_| DecodeError::InvalidFormat)
}

fn encode_compact(public: &PublicKey, symmetric_key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(COMPACT_PAYLOAD_SIZE);
    payload.extend_from_slice(public.as_bytes());
    payload.extend_from_slice(symmetric_key);

    let mut encoder = DeflateEncoder::new(payload.as_slice(), Compression::best());
    let mut compressed = Vec::new();
    let Ok(_) = encoder.read_to_end(&mut compressed) else {
        unreachable!("in-memory DEFLATE of a 64-byte buffer cannot fail");
    };

    URL_SAFE.encode(&compressed).trim_end_matches('=').to_string()
}

fn decode_compact(token: &str) -> Result<KeyMaterial, DecodeError> {
    // Manual transcription introduces stray whitespace; drop it all
    let compact: String = token.split_whitespace().collect();
    let compressed = URL_SAFE
        .decode(restore_padding(&compact).as_bytes())
        .map_err(|_| DecodeError::InvalidFormat)?;

    let mut payload = Vec::new();
    let mut decoder = DeflateDecoder::new(compressed.as_slice());
    decoder.read_to_end(&mut payload).map_err(|_| DecodeError::InvalidFormat)?;

    if payload.len() != COMPACT_PAYLOAD_SIZE {
        return Err(DecodeError::WrongLength {
            expected: COMPACT_PAYLOAD_SIZE,
            got: payload.len(),
        });
    }

    let mut public_bytes = [0u8; KEY_SIZE];
    public_bytes.copy_from_slice(&payload[..KEY_SIZE]);
    let mut symmetric_key = [0u8; KEY_SIZE];
    symmetric_key.copy_from_slice(&payload[KEY_SIZE..]);

    negotiate(PublicKey::from(public_bytes), symmetric_key)
}

fn decode_legacy_pem(token: &str) -> Result<KeyMaterial, DecodeError> {
    let (pem, key_part) =
        token.split_once(PEM_DELIMITER).ok_or(DecodeError::InvalidFormat)?;

    let peer_public = parse_pem_public_key(pem)?;
    let symmetric_key = decode_symmetric_key(key_part)?;
    negotiate(peer_public, symmetric_key)
}

fn decode_legacy_key(token: &str) -> Result<KeyMaterial, DecodeError> {
    let symmetric_key = decode_symmetric_key(token)?;
    // No peer public key, so no exchange; fallback mode only. The fresh
    // pair keeps the material shape uniform across decode paths.
    Ok(KeyMaterial::from_parts(symmetric_key, Some(KeyPair::generate()), None))
}

/// Fresh local pair + one DH exchange against the token's public key.
fn negotiate(
    peer_public: PublicKey,
    symmetric_key: [u8; KEY_SIZE],
) -> Result<KeyMaterial, DecodeError> {
    let pair = KeyPair::generate();
    let shared = pair.diffie_hellman(&peer_public);

    // An all-zero output means the peer supplied a low-order point
    if shared == [0u8; KEY_SIZE] {
        return Err(DecodeError::InvalidPoint);
    }

    Ok(KeyMaterial::from_parts(symmetric_key, Some(pair), Some(shared)))
}

fn parse_pem_public_key(pem: &str) -> Result<PublicKey, DecodeError> {
    let trimmed = pem.trim();
    let body = trimmed
        .strip_prefix(PEM_HEADER)
        .and_then(|rest| rest.strip_suffix(PEM_FOOTER))
        .ok_or(DecodeError::InvalidFormat)?;

    let joined: String = body.split_whitespace().collect();
    let der = STANDARD.decode(joined.as_bytes()).map_err(|_| DecodeError::InvalidFormat)?;

    // Either a raw 32-byte key or a DER SubjectPublicKeyInfo whose trailing
    // 32 bytes are the key
    if der.len() < KEY_SIZE {
        return Err(DecodeError::WrongLength { expected: KEY_SIZE, got: der.len() });
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&der[der.len() - KEY_SIZE..]);
    Ok(PublicKey::from(bytes))
}

fn decode_symmetric_key(text: &str) -> Result<[u8; KEY_SIZE], DecodeError> {
    let compact: String = text.split_whitespace().collect();
    let bytes = URL_SAFE
        .decode(restore_padding(&compact).as_bytes())
        .map_err(|_| DecodeError::InvalidFormat)?;

    if bytes.len() != KEY_SIZE {
        return Err(DecodeError::WrongLength { expected: KEY_SIZE, got: bytes.len() });
    }

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Re-append the `=` padding stripped for transcription.
fn restore_padding(s: &str) -> String {
    let mut out = s.to_string();
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_round_trip_recovers_symmetric_key() {
        let material = KeyMaterial::generate();
        let token = encode(&material);
        let decoded = decode(&token).unwrap();

        assert_eq!(decoded.symmetric_key(), material.symmetric_key());
        assert!(decoded.key_pair().is_some());
        assert!(decoded.shared_secret().is_some());
    }

    #[test]
    fn compact_token_has_no_padding_chars() {
        let material = KeyMaterial::generate();
        assert!(!encode(&material).contains('='));
    }

    #[test]
    fn shared_secret_differs_per_decode() {
        let material = KeyMaterial::generate();
        let token = encode(&material);

        let first = decode(&token).unwrap();
        let second = decode(&token).unwrap();
        assert_ne!(first.shared_secret().unwrap(), second.shared_secret().unwrap());
    }

    #[test]
    fn both_exchange_sides_agree() {
        // Simulated two-sided exchange: the decoder's shared secret equals
        // what the encoder would derive from the decoder's public key.
        let encoder_side = KeyMaterial::generate();
        let token = encode(&encoder_side);
        let decoder_side = decode(&token).unwrap();

        let encoder_view = encoder_side
            .key_pair()
            .unwrap()
            .diffie_hellman(decoder_side.key_pair().unwrap().public());
        assert_eq!(&encoder_view, decoder_side.shared_secret().unwrap());
    }

    #[test]
    fn decode_tolerates_whitespace() {
        let material = KeyMaterial::generate();
        let token = encode(&material);
        let mangled = format!("  {}\n", token);
        assert_eq!(decode(&mangled).unwrap().symmetric_key(), material.symmetric_key());
    }

    #[test]
    fn legacy_key_only_round_trip() {
        let key = [0xABu8; 32];
        let token = URL_SAFE.encode(key);

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.symmetric_key(), &key);
        assert!(decoded.shared_secret().is_none());
    }

    #[test]
    fn legacy_key_only_without_padding() {
        let key = [0xCDu8; 32];
        let token = URL_SAFE.encode(key).trim_end_matches('=').to_string();
        assert_eq!(decode(&token).unwrap().symmetric_key(), &key);
    }

    #[test]
    fn legacy_pem_raw_key_round_trip() {
        let peer = KeyPair::generate();
        let sym = [0x55u8; 32];
        let token = format!(
            "{PEM_HEADER}\n{}\n{PEM_FOOTER}|{}",
            STANDARD.encode(peer.public().as_bytes()),
            URL_SAFE.encode(sym),
        );

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.symmetric_key(), &sym);
        // The decoder's secret agrees with what the peer derives
        let peer_view = peer.diffie_hellman(decoded.key_pair().unwrap().public());
        assert_eq!(&peer_view, decoded.shared_secret().unwrap());
    }

    #[test]
    fn legacy_pem_spki_body_round_trip() {
        // DER SubjectPublicKeyInfo for X25519: 12-byte prefix + raw key
        let peer = KeyPair::generate();
        let mut spki = vec![
            0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
        ];
        spki.extend_from_slice(peer.public().as_bytes());

        let sym = [0x66u8; 32];
        let token = format!(
            "{PEM_HEADER}\n{}\n{PEM_FOOTER}|{}",
            STANDARD.encode(&spki),
            URL_SAFE.encode(sym),
        );

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.symmetric_key(), &sym);
        let peer_view = peer.diffie_hellman(decoded.key_pair().unwrap().public());
        assert_eq!(&peer_view, decoded.shared_secret().unwrap());
    }

    #[test]
    fn garbage_is_invalid_format() {
        for garbage in ["", "not a token", "!!!!", "a:b:c", "===="] {
            assert_eq!(decode(garbage), Err(DecodeError::InvalidFormat));
        }
    }

    #[test]
    fn wrong_length_key_is_rejected() {
        let short = URL_SAFE.encode([0u8; 16]);
        assert_eq!(decode(&short), Err(DecodeError::InvalidFormat));
    }

    #[test]
    fn truncated_compact_payload_is_rejected() {
        // Deflate a payload of the wrong size and encode it like a compact
        // token; the length check must catch it
        let mut encoder =
            DeflateEncoder::new(&[0u8; 48][..], Compression::best());
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).unwrap();
        let token = URL_SAFE.encode(&compressed).trim_end_matches('=').to_string();

        assert_eq!(decode(&token), Err(DecodeError::InvalidFormat));
    }

    #[test]
    fn low_order_public_key_is_rejected() {
        // All-zero public key forces an all-zero shared secret
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0u8; 32]);
        payload.extend_from_slice(&[0x77u8; 32]);

        let mut encoder = DeflateEncoder::new(payload.as_slice(), Compression::best());
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).unwrap();
        let token = URL_SAFE.encode(&compressed).trim_end_matches('=').to_string();

        assert_eq!(decode(&token), Err(DecodeError::InvalidFormat));
    }

    #[test]
    fn pairless_material_encodes_legacy() {
        let material = KeyMaterial::from_parts([0x88u8; 32], None, None);
        let token = encode(&material);
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.symmetric_key(), &[0x88u8; 32]);
        assert!(decoded.shared_secret().is_none());
    }
}

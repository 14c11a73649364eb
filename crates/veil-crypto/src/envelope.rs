//! Wire envelope seal/open.
//!
//! Two envelope shapes share one AEAD (ChaCha20-Poly1305, 96-bit nonce):
//!
//! Forward-secrecy mode, keyed by a per-message derived key:
//!
//! `[counter: u64 BE][nonce: 12][tag: 16][ciphertext]`
//!
//! Static mode, keyed directly by the channel's symmetric key:
//!
//! `[nonce: 12][ciphertext || tag]`
//!
//! Both are URL-safe base64 on the wire. Opening is a total operation: every
//! failure path returns `None`, never panics, so callers can chain mode
//! attempts over untrusted input.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{CryptoRng, RngCore};

/// Counter width in the forward-secrecy envelope.
pub const COUNTER_SIZE: usize = 8;

/// Nonce width (96-bit ChaCha20-Poly1305 nonce).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag width.
pub const TAG_SIZE: usize = 16;

/// Smallest possible forward-secrecy envelope (empty ciphertext).
///
/// Decoded envelopes shorter than this cannot be forward-mode and skip
/// straight to the static-key attempt.
pub const MIN_FORWARD_SIZE: usize = COUNTER_SIZE + NONCE_SIZE + TAG_SIZE;

/// Parsed fields of a forward-secrecy envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardParts {
    /// Key-derivation counter, big-endian on the wire.
    pub counter: u64,
    /// AEAD nonce.
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag re-appended, ready for [`open`].
    pub ciphertext: Vec<u8>,
}

/// Seal a frame under a one-time derived key (forward-secrecy mode).
pub fn seal_forward<R: RngCore + CryptoRng>(
    key: &[u8; 32],
    counter: u64,
    frame: &[u8],
    rng: &mut R,
) -> Vec<u8> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let sealed = seal(key, &nonce, frame);

    // The AEAD appends the tag; the wire layout carries it up front
    let split = sealed.len() - TAG_SIZE;
    let (body, tag) = sealed.split_at(split);

    let mut envelope = Vec::with_capacity(MIN_FORWARD_SIZE + body.len());
    envelope.extend_from_slice(&counter.to_be_bytes());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(tag);
    envelope.extend_from_slice(body);
    envelope
}

/// Split a forward-secrecy envelope into its fields.
///
/// Returns `None` for anything shorter than [`MIN_FORWARD_SIZE`]. The
/// counter is needed before the key can be derived, which is why parsing is
/// separate from [`open`].
pub fn parse_forward(bytes: &[u8]) -> Option<ForwardParts> {
    if bytes.len() < MIN_FORWARD_SIZE {
        return None;
    }

    let mut counter_bytes = [0u8; COUNTER_SIZE];
    counter_bytes.copy_from_slice(&bytes[..COUNTER_SIZE]);

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&bytes[COUNTER_SIZE..COUNTER_SIZE + NONCE_SIZE]);

    let tag = &bytes[COUNTER_SIZE + NONCE_SIZE..MIN_FORWARD_SIZE];
    let body = &bytes[MIN_FORWARD_SIZE..];

    // Re-append the tag so the ciphertext is in the AEAD's native shape
    let mut ciphertext = Vec::with_capacity(body.len() + TAG_SIZE);
    ciphertext.extend_from_slice(body);
    ciphertext.extend_from_slice(tag);

    Some(ForwardParts { counter: u64::from_be_bytes(counter_bytes), nonce, ciphertext })
}

/// Seal a frame directly under the static symmetric key.
pub fn seal_static<R: RngCore + CryptoRng>(
    key: &[u8; 32],
    frame: &[u8],
    rng: &mut R,
) -> Vec<u8> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let sealed = seal(key, &nonce, frame);

    let mut envelope = Vec::with_capacity(NONCE_SIZE + sealed.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&sealed);
    envelope
}

/// Open a static-mode envelope. `None` on any failure.
pub fn open_static(key: &[u8; 32], bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return None;
    }

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&bytes[..NONCE_SIZE]);

    open(key, &nonce, &bytes[NONCE_SIZE..])
}

/// AEAD seal.
fn seal(key: &[u8; 32], nonce: &[u8; NONCE_SIZE], frame: &[u8]) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let Ok(sealed) = cipher.encrypt(Nonce::from_slice(nonce), frame) else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    sealed
}

/// AEAD open. `None` if the tag or key is wrong.
pub fn open(key: &[u8; 32], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Option<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
}

/// Text-encode a binary envelope for the wire.
pub fn encode_text(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}

/// Decode a wire envelope back to bytes. `None` on malformed encoding.
pub fn decode_text(text: &str) -> Option<Vec<u8>> {
    URL_SAFE.decode(text.trim().as_bytes()).ok()
}

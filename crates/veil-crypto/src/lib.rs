//! Veil cryptographic layer.
//!
//! Key negotiation, authenticated envelope encryption, and the shareable
//! connection token for the Veil chat channel. All of this is synchronous and
//! I/O-free; the async send pacing and socket plumbing live in `veil-channel`
//! and `veil-relay`.
//!
//! # Key Lifecycle
//!
//! A channel opens with fresh [`KeyMaterial`]: either generated locally (the
//! listening side) or recovered from a peer's connection token (the
//! connecting side, which performs one X25519 exchange against the public key
//! bundled in the token).
//!
//! ```text
//! Connection token ──► KeyMaterial (symmetric key, key pair, shared secret)
//!        │
//!        ▼
//! HKDF(shared secret, counter) ──► one-time message key     (forward mode)
//!        │                         symmetric key directly   (static mode)
//!        ▼
//! ChaCha20-Poly1305 ──► Envelope (base64 text on the wire)
//! ```
//!
//! Each message in forward-secrecy mode is sealed under a key derived from
//! the shared secret and a strictly increasing counter, so compromise of the
//! long-term symmetric key does not expose past traffic. Key material is
//! zeroized on drop and may be cleansed explicitly at channel close.
//!
//! # Security
//!
//! - Authenticity: ChaCha20-Poly1305 rejects any tampered envelope.
//! - Length hiding: plaintexts are padded to fixed buckets (`veil-proto`)
//!   before sealing, so ciphertext lengths reveal only the bucket.
//! - Cover traffic: [`dummy`] plaintexts are indistinguishable on the wire
//!   from real messages; they are recognized only after decryption.
//! - Erasure is best-effort: zeroization cannot defeat swapping or copies the
//!   optimizer already made. Treat it as hygiene, not a guarantee.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod derive;
pub mod dummy;
pub mod engine;
pub mod envelope;
mod error;
pub mod material;
pub mod token;

pub use derive::derive_message_key;
pub use dummy::DUMMY_MARKER;
pub use engine::{CipherEngine, KeyState};
pub use error::{ChannelError, DecodeError};
pub use material::{KeyMaterial, KeyPair};

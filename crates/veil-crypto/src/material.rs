//! Channel key material.
//!
//! One [`KeyMaterial`] backs one channel: a 32-byte symmetric key (always
//! present once negotiated), an optional X25519 key pair generated fresh per
//! process instance, and an optional shared secret from a single
//! Diffie-Hellman exchange. The shared secret, once derived, is never
//! recomputed or rotated within a process lifetime.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// An X25519 key pair.
///
/// Generated fresh for every process instance, never persisted, never reused
/// across runs. Held as a `StaticSecret` so the pair can live for the process
/// lifetime; it is still ephemeral in the protocol sense.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.secret.to_bytes() == other.secret.to_bytes()
            && self.public == other.public
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half.
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// One X25519 exchange against a peer's public key.
    pub fn diffie_hellman(&self, peer: &PublicKey) -> [u8; 32] {
        self.secret.diffie_hellman(peer).to_bytes()
    }
}

/// All key material backing one channel.
#[derive(Clone, PartialEq)]
pub struct KeyMaterial {
    symmetric_key: [u8; 32],
    key_pair: Option<KeyPair>,
    shared_secret: Option<[u8; 32]>,
    message_counter: u64,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("symmetric_key", &"[REDACTED]")
            .field("key_pair", &self.key_pair)
            .field("shared_secret", &self.shared_secret.map(|_| "[REDACTED]"))
            .field("message_counter", &self.message_counter)
            .finish()
    }
}

impl KeyMaterial {
    /// Generate fresh material for the listening side: random symmetric key,
    /// fresh key pair, no shared secret yet.
    pub fn generate() -> Self {
        use rand::RngCore;

        let mut symmetric_key = [0u8; 32];
        OsRng.fill_bytes(&mut symmetric_key);

        Self {
            symmetric_key,
            key_pair: Some(KeyPair::generate()),
            shared_secret: None,
            message_counter: 0,
        }
    }

    /// Assemble material from already-negotiated parts (token decoding).
    pub fn from_parts(
        symmetric_key: [u8; 32],
        key_pair: Option<KeyPair>,
        shared_secret: Option<[u8; 32]>,
    ) -> Self {
        Self { symmetric_key, key_pair, shared_secret, message_counter: 0 }
    }

    /// The 32-byte symmetric key (static-mode AEAD key).
    pub fn symmetric_key(&self) -> &[u8; 32] {
        &self.symmetric_key
    }

    /// The local key pair, if one was generated.
    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    /// The derived shared secret, if a DH exchange has happened.
    pub fn shared_secret(&self) -> Option<&[u8; 32]> {
        self.shared_secret.as_ref()
    }

    /// Current message counter value.
    pub fn counter(&self) -> u64 {
        self.message_counter
    }

    /// Increment the shared counter and return the value for this message.
    ///
    /// The counter is public key-derivation context; values are strictly
    /// increasing, so a derivation context is never reused under one secret.
    pub fn next_counter(&mut self) -> u64 {
        self.message_counter = self.message_counter.wrapping_add(1);
        self.message_counter
    }

    /// Overwrite secret buffers with zeros.
    ///
    /// Best-effort erasure for channel close; `zeroize` prevents the
    /// compiler from eliding the writes, but cannot undo swapping or copies
    /// already made elsewhere.
    pub fn cleanse(&mut self) {
        self.symmetric_key.zeroize();
        if let Some(secret) = &mut self.shared_secret {
            secret.zeroize();
        }
        self.shared_secret = None;
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.symmetric_key.zeroize();
        if let Some(secret) = &mut self.shared_secret {
            secret.zeroize();
        }
    }
}

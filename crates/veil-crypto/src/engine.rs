//! Cipher engine state machine.
//!
//! One engine per channel. The state is derived from the key material it
//! holds:
//!
//! `Uninitialized → KeyedStatic → KeyedForwardSecret`
//!
//! Setting a symmetric key alone reaches `KeyedStatic`; additionally holding
//! a shared secret reaches `KeyedForwardSecret`. Both keyed states encrypt
//! and decrypt; `Uninitialized` rejects both with
//! [`ChannelError::NotKeyed`].
//!
//! Decryption is a total fallback chain over untrusted input: the
//! forward-secrecy parse is attempted first (gated on the minimum envelope
//! size), then the static-key open. A failure in both is
//! [`ChannelError::DecryptFailed`] — expected during mode mismatch or
//! corruption, never a panic, never a disconnect.
//!
//! The engine is synchronous and single-writer: `encrypt` mutates the shared
//! message counter, so concurrent callers must serialize through their own
//! lock. Send pacing (the traffic obfuscator's delay gate) happens in the
//! channel layer immediately before `encrypt` is called.

use rand::rngs::OsRng;

use crate::{
    ChannelError, KeyMaterial, derive, dummy, envelope,
};

/// Keying state of a [`CipherEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No key material; encrypt/decrypt are rejected.
    Uninitialized,
    /// Symmetric key only; static-mode AEAD.
    KeyedStatic,
    /// Symmetric key plus shared secret; per-message derived keys.
    KeyedForwardSecret,
}

/// Per-channel encryption engine.
#[derive(Debug, Default)]
pub struct CipherEngine {
    material: Option<KeyMaterial>,
}

impl CipherEngine {
    /// New engine with no key material.
    pub fn new() -> Self {
        Self { material: None }
    }

    /// New engine keyed with the given material.
    pub fn with_material(material: KeyMaterial) -> Self {
        Self { material: Some(material) }
    }

    /// Install key material, replacing any previous material.
    pub fn set_material(&mut self, material: KeyMaterial) {
        self.material = Some(material);
    }

    /// Current keying state.
    pub fn state(&self) -> KeyState {
        match &self.material {
            None => KeyState::Uninitialized,
            Some(material) if material.shared_secret().is_some() => KeyState::KeyedForwardSecret,
            Some(_) => KeyState::KeyedStatic,
        }
    }

    /// Encrypt a plaintext into a wire envelope.
    ///
    /// Pads to a fixed bucket, then seals in forward-secrecy mode when a
    /// shared secret is held, static mode otherwise.
    ///
    /// # Errors
    ///
    /// - `ChannelError::NotKeyed` if no material is installed
    /// - `ChannelError::Frame` if the plaintext exceeds the largest bucket
    pub fn encrypt(&mut self, plaintext: &str) -> Result<String, ChannelError> {
        let Some(material) = &mut self.material else {
            return Err(ChannelError::NotKeyed);
        };

        let frame = veil_proto::frame::pad(plaintext.as_bytes(), &mut OsRng)?;

        let sealed = match material.shared_secret().copied() {
            Some(shared) => {
                let counter = material.next_counter();
                let key = derive::derive_message_key(&shared, counter);
                envelope::seal_forward(&key, counter, &frame, &mut OsRng)
            },
            None => envelope::seal_static(material.symmetric_key(), &frame, &mut OsRng),
        };

        Ok(envelope::encode_text(&sealed))
    }

    /// Decrypt a wire envelope back to its plaintext.
    ///
    /// Total over arbitrary input: any malformed, corrupted, or
    /// wrong-mode envelope yields `ChannelError::DecryptFailed`. The error
    /// does not distinguish wrong key from corruption.
    pub fn decrypt(&self, envelope_text: &str) -> Result<String, ChannelError> {
        let Some(material) = &self.material else {
            return Err(ChannelError::NotKeyed);
        };

        let Some(bytes) = envelope::decode_text(envelope_text) else {
            return Err(ChannelError::DecryptFailed);
        };

        // Forward-secrecy attempt first, gated on the minimum envelope size
        if bytes.len() >= envelope::MIN_FORWARD_SIZE {
            if let (Some(shared), Some(parts)) =
                (material.shared_secret(), envelope::parse_forward(&bytes))
            {
                let key = derive::derive_message_key(shared, parts.counter);
                if let Some(frame) = envelope::open(&key, &parts.nonce, &parts.ciphertext) {
                    return Self::plaintext_from_frame(&frame);
                }
            }
        }

        // Static-key fallback on the raw decoded bytes
        if let Some(frame) = envelope::open_static(material.symmetric_key(), &bytes) {
            return Self::plaintext_from_frame(&frame);
        }

        Err(ChannelError::DecryptFailed)
    }

    /// Build and encrypt one cover message.
    pub fn generate_dummy(&mut self) -> Result<String, ChannelError> {
        let plaintext = dummy::generate_plaintext(&mut OsRng);
        self.encrypt(&plaintext)
    }

    /// Whether a decrypted plaintext is cover traffic.
    pub fn is_dummy(plaintext: &str) -> bool {
        dummy::is_dummy(plaintext)
    }

    /// Zeroize and discard the key material. The engine returns to
    /// `Uninitialized`.
    pub fn cleanse(&mut self) {
        if let Some(mut material) = self.material.take() {
            material.cleanse();
        }
    }

    fn plaintext_from_frame(frame: &[u8]) -> Result<String, ChannelError> {
        let plaintext = veil_proto::frame::unpad(frame)?;
        String::from_utf8(plaintext).map_err(|_| ChannelError::DecryptFailed)
    }
}

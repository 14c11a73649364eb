//! Channel-layer error taxonomy.
//!
//! Cryptographic and framing failures are local and recoverable (the single
//! message is dropped); connection failures terminate the channel and always
//! propagate to the caller. A failed decrypt deliberately does not reveal
//! whether the key was wrong or the frame corrupted.

use thiserror::Error;
use veil_proto::FrameError;

/// Errors from the secure channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Operation attempted before key material was established.
    ///
    /// Programmer error; API sequencing should prevent it, but it must not
    /// crash the process.
    #[error("channel is not keyed")]
    NotKeyed,

    /// Envelope failed to decrypt in every mode.
    ///
    /// Authentication failure, corruption, or a mode mismatch. Expected
    /// during normal operation; callers drop the message and keep the
    /// connection open.
    #[error("decryption failed")]
    DecryptFailed,

    /// Framing failure on the plaintext side.
    ///
    /// Oversize plaintext on encrypt, or a corrupted frame recovered from a
    /// successfully opened envelope. Treated as a dropped message.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The underlying connection failed.
    ///
    /// Terminates the channel. The caller decides on reconnection; the core
    /// never retries internally.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Description of the I/O failure.
        reason: String,
    },
}

/// Errors decoding a connection token.
///
/// All decode failures surface as a single recoverable error; the user
/// re-enters the string. No partial key material survives a failed decode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The token matched none of the known formats.
    #[error("unrecognized connection token")]
    InvalidFormat,

    /// A payload had the wrong length for its format.
    #[error("wrong payload length: expected {expected}, got {got}")]
    WrongLength {
        /// Length the format requires.
        expected: usize,
        /// Length actually decoded.
        got: usize,
    },

    /// The bundled public key was not a usable curve point.
    #[error("invalid public key point")]
    InvalidPoint,
}

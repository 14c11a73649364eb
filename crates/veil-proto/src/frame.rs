//! Fixed-bucket padded frames.
//!
//! Layout on the wire (before encryption):
//!
//! `[plaintext_len: u32 BE] + [plaintext] + [random padding]`
//!
//! The total frame length is always the smallest member of [`FRAME_BUCKETS`]
//! that fits the plaintext plus [`MIN_PADDING`]. Two plaintexts whose lengths
//! fall in the same bucket produce frames of identical length.
//!
//! # Invariants
//!
//! - Bucket Choice: the emitted frame length depends only on
//!   `plaintext.len()`, never on the padding bytes drawn.
//! - Padding Freshness: padding bytes come from a CSPRNG, so equal-length
//!   plaintexts do not share padding content.
//! - Empty Distinct: a zero-length plaintext is a valid frame
//!   (`plaintext_len == 0`), not a decode failure.

use rand::{CryptoRng, RngCore};
use thiserror::Error;

/// Permitted total frame sizes, ascending.
pub const FRAME_BUCKETS: [usize; 4] = [512, 1024, 2048, 4096];

/// Minimum number of padding bytes appended to every frame.
pub const MIN_PADDING: usize = 16;

/// Size of the big-endian length prefix.
const LEN_PREFIX: usize = 4;

/// Largest plaintext that fits the largest bucket.
pub const MAX_PLAINTEXT: usize = FRAME_BUCKETS[3] - LEN_PREFIX - MIN_PADDING;

/// Framing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame shorter than the length prefix.
    #[error("frame truncated: {len} bytes, need at least {LEN_PREFIX}")]
    Truncated {
        /// Bytes actually present.
        len: usize,
    },

    /// Declared plaintext length exceeds the bytes that follow the prefix.
    #[error("length mismatch: declared {declared}, only {available} available")]
    LengthMismatch {
        /// Length claimed by the prefix.
        declared: usize,
        /// Bytes actually following the prefix.
        available: usize,
    },

    /// Plaintext too large for the largest permitted bucket.
    #[error("plaintext too large: {len} bytes, max {max}")]
    TooLarge {
        /// Plaintext length.
        len: usize,
        /// Largest supported plaintext length.
        max: usize,
    },
}

/// Smallest permitted bucket holding `plaintext_len` bytes plus the prefix
/// and minimum padding. `None` if no bucket fits.
pub fn bucket_for(plaintext_len: usize) -> Option<usize> {
    let needed = LEN_PREFIX.checked_add(plaintext_len)?.checked_add(MIN_PADDING)?;
    FRAME_BUCKETS.into_iter().find(|&bucket| bucket >= needed)
}

/// Pad a plaintext into a fixed-bucket frame.
///
/// # Errors
///
/// - `FrameError::TooLarge` if the plaintext does not fit the largest bucket
pub fn pad<R: RngCore + CryptoRng>(
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>, FrameError> {
    let bucket = bucket_for(plaintext.len())
        .ok_or(FrameError::TooLarge { len: plaintext.len(), max: MAX_PLAINTEXT })?;

    // INVARIANT: bucket >= LEN_PREFIX + plaintext.len() + MIN_PADDING, so the
    // padding region is at least MIN_PADDING bytes and the subtraction below
    // cannot underflow.
    let pad_len = bucket - LEN_PREFIX - plaintext.len();

    let mut frame = Vec::with_capacity(bucket);
    frame.extend_from_slice(&(plaintext.len() as u32).to_be_bytes());
    frame.extend_from_slice(plaintext);

    let mut padding = vec![0u8; pad_len];
    rng.fill_bytes(&mut padding);
    frame.extend_from_slice(&padding);

    debug_assert_eq!(frame.len(), bucket);

    Ok(frame)
}

/// Recover the plaintext from a padded frame.
///
/// Zero-length plaintexts round-trip to an empty vector.
///
/// # Errors
///
/// - `FrameError::Truncated` if the frame is shorter than the length prefix
/// - `FrameError::LengthMismatch` if the declared length exceeds the bytes
///   present
pub fn unpad(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    if frame.len() < LEN_PREFIX {
        return Err(FrameError::Truncated { len: frame.len() });
    }

    let mut prefix = [0u8; LEN_PREFIX];
    prefix.copy_from_slice(&frame[..LEN_PREFIX]);
    let declared = u32::from_be_bytes(prefix) as usize;

    let available = frame.len() - LEN_PREFIX;
    if declared > available {
        return Err(FrameError::LengthMismatch { declared, available });
    }

    Ok(frame[LEN_PREFIX..LEN_PREFIX + declared].to_vec())
}

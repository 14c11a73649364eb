//! Veil protocol data layer.
//!
//! Pure data structures for the secure channel: the padded fixed-bucket
//! [`frame`] format that hides plaintext lengths, and the [`connect`]
//! credential structure peers exchange out of band. No crypto and no I/O
//! happen here; encryption lives in `veil-crypto` and the socket plumbing in
//! `veil-channel` / `veil-relay`.
//!
//! # Traffic-analysis defense
//!
//! Every plaintext is padded to one of a small set of permitted frame sizes
//! before encryption. An observer who sees only ciphertext lengths learns at
//! most which bucket a message fell into, never its exact size.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connect;
pub mod frame;

pub use connect::{ConnectError, ConnectionString};
pub use frame::{FRAME_BUCKETS, FrameError, MIN_PADDING, bucket_for, pad, unpad};

//! Veil client-side channel.
//!
//! Async glue around the pure `veil-crypto` engine: a [`ChannelClient`] owns
//! one outbound connection and pushes plaintext through
//! pad → seal → pace → socket, and the reverse on receipt. The
//! [`TrafficObfuscator`] enforces a randomized minimum spacing between sends
//! so an observer cannot correlate keystrokes with wire activity.
//!
//! The anonymizing transport is a collaborator, not part of this crate: the
//! [`Rendezvous`] trait is the seam where an onion-service manager (or the
//! [`LoopbackRendezvous`] development stand-in) plugs in.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod obfuscator;
pub mod transport;

pub use client::{ChannelClient, READ_CHUNK};
pub use obfuscator::{ObfuscationConfig, TrafficObfuscator};
pub use transport::{LoopbackRendezvous, Rendezvous};

//! Dummy-traffic plaintexts.
//!
//! Cover messages carry a reserved marker prefix followed by random hex
//! filler of randomized length. On the wire they are ordinary envelopes with
//! the ordinary size distribution; only a party holding the channel key can
//! tell them apart, after decryption, by the prefix.
//!
//! Known hazard: classification happens inside the plaintext namespace. A
//! genuine message that starts with [`DUMMY_MARKER`] is silently discarded
//! as cover traffic. A tagging bit outside the plaintext would remove the
//! ambiguity at the cost of a wire-format change.

use rand::{CryptoRng, Rng, RngCore};

/// Reserved prefix identifying cover traffic after decryption.
pub const DUMMY_MARKER: &str = "DUMMY:";

/// Filler length bounds in raw bytes (doubled by hex encoding).
const MIN_FILLER: usize = 8;
const MAX_FILLER: usize = 64;

/// Build a fresh dummy plaintext: marker plus random hex filler.
pub fn generate_plaintext<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let filler_len = rng.gen_range(MIN_FILLER..=MAX_FILLER);
    let mut filler = vec![0u8; filler_len];
    rng.fill_bytes(&mut filler);
    format!("{DUMMY_MARKER}{}", hex::encode(filler))
}

/// Whether a decrypted plaintext is cover traffic.
pub fn is_dummy(plaintext: &str) -> bool {
    plaintext.starts_with(DUMMY_MARKER)
}

//! SHA-1 helpers shared by the solver and the protocol layer.
//!
//! The difficulty predicate and the decimal nonce encoder run hundreds of
//! millions of times per solve, so both work on stack buffers and never
//! allocate.

use sha1::{Digest, Sha1};

/// Number of bytes in a SHA-1 digest.
pub const DIGEST_LEN: usize = 20;

/// Longest decimal rendering of a `u64` (`u64::MAX` has 20 digits).
pub const DECIMAL_MAX: usize = 20;

/// Binary SHA-1 of a byte sequence.
pub fn sha1_bytes(input: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Lowercase hex encoding of the SHA-1 of `input`, always 40 characters.
pub fn sha1_hex(input: &[u8]) -> String {
    hex::encode(sha1_bytes(input))
}

/// True iff the first `nibbles` hex digits of `digest` are zero.
///
/// Whole leading bytes must be zero; an odd count additionally requires a
/// zero high nibble in the next byte.
#[inline]
pub fn leading_zero_nibbles(digest: &[u8; DIGEST_LEN], nibbles: u32) -> bool {
    if nibbles as usize > DIGEST_LEN * 2 {
        return false;
    }
    let whole = (nibbles / 2) as usize;
    for &byte in &digest[..whole] {
        if byte != 0 {
            return false;
        }
    }
    if nibbles % 2 == 1 && digest[whole] & 0xf0 != 0 {
        return false;
    }
    true
}

/// Write `value` as decimal ASCII into `buf` and return the used slice.
///
/// The decimal text is the wire form of a nonce, so the same bytes feed
/// both the hash probe and the reply line.
#[inline]
pub fn decimal(value: u64, buf: &mut [u8; DECIMAL_MAX]) -> &[u8] {
    if value == 0 {
        buf[0] = b'0';
        return &buf[..1];
    }
    let mut pos = DECIMAL_MAX;
    let mut rest = value;
    while rest > 0 {
        pos -= 1;
        buf[pos] = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    &buf[pos..]
}

/// SHA-1 state with a fixed prefix already absorbed.
///
/// Cloning the captured state and absorbing only a suffix yields the same
/// digest as hashing `prefix || suffix` from scratch, which removes the
/// redundant prefix pass from every solver probe.
#[derive(Debug, Clone)]
pub struct Sha1Prefix {
    state: Sha1,
}

impl Sha1Prefix {
    /// Absorb `prefix` once; later probes clone the captured state.
    pub fn new(prefix: &[u8]) -> Self {
        let mut state = Sha1::new();
        state.update(prefix);
        Self { state }
    }

    /// Digest of `prefix || suffix` using the captured state.
    #[inline]
    pub fn digest_with_suffix(&self, suffix: &[u8]) -> [u8; DIGEST_LEN] {
        let mut probe = self.state.clone();
        probe.update(suffix);
        probe.finalize().into()
    }
}

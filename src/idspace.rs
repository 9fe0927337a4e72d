//! The shared 128-bit identifier space both overlays route over.
//!
//! IDs are derived from strings by truncating a SHA-1 digest to its top 128
//! bits. All operations here are total, pure and deterministic.

use sha1::{Digest, Sha1};

/// Number of bits in the identifier space.
pub const ID_BITS: u32 = 128;

/// Number of hex digits in the full identifier representation.
pub const ID_HEX_LEN: usize = (ID_BITS / 4) as usize;

/// Hash a UTF-8 string into the 128-bit identifier space.
///
/// Uses the top 128 bits (32 hex digits) of the SHA-1 digest of `s`.
/// Collisions are possible and are treated as ordinary data, not an error.
pub fn hash128(s: &str) -> u128 {
    let mut hasher = Sha1::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[0..16]);
    u128::from_be_bytes(bytes)
}

/// Render an ID as a zero-padded, lowercase, 32-digit hex string.
pub fn to_hex(id: u128) -> String {
    format!("{id:0width$x}", width = ID_HEX_LEN)
}

/// Length of the longest common hex-digit prefix of `a` and `b`, in [0, 32].
pub fn common_prefix_hex(a: u128, b: u128) -> usize {
    let ah = to_hex(a);
    let bh = to_hex(b);
    ah.bytes().zip(bh.bytes()).take_while(|(x, y)| x == y).count()
}

/// Circular (shortest-arc) distance between `a` and `b` on the ring of size
/// 2^128. Symmetric; zero iff `a == b`.
pub fn circ_dist(a: u128, b: u128) -> u128 {
    let d = a.wrapping_sub(b);
    let rev = b.wrapping_sub(a);
    d.min(rev)
}

/// Membership test for the half-open ring interval `(a, b]` (or `(a, b)` if
/// `inclusive_right` is false), handling wrap-around when `a >= b`.
pub fn in_interval(x: u128, a: u128, b: u128, inclusive_right: bool) -> bool {
    if a < b {
        if inclusive_right {
            x > a && x <= b
        } else {
            x > a && x < b
        }
    } else if inclusive_right {
        x > a || x <= b
    } else {
        x > a || x < b
    }
}

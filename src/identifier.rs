//! Key → vector id mapping.
//!
//! The id is `SHA1(key) mod 10^18`. The bound keeps every id exactly
//! representable as a decimal integer in stores that cap numeric precision
//! at 38 digits or as a signed 64-bit column.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Exclusive upper bound of every [`VectorId`].
pub const MODULUS: u64 = 1_000_000_000_000_000_000;

/// A stable identifier derived from a record key. Always `< MODULUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(u64);

impl VectorId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VectorId> for serde_json::Value {
    fn from(id: VectorId) -> Self {
        serde_json::Value::from(id.0)
    }
}

/// Compute the vector id for `key`.
///
/// Any string is accepted, including the empty one; rejecting bad keys is the
/// caller's job.
pub fn identifier_of(key: &str) -> VectorId {
    let digest = Sha1::digest(key.as_bytes());
    VectorId(reduce(&digest))
}

/// Hex SHA-1 of `key`, the intermediate value behind [`identifier_of`].
pub fn digest_hex(key: &str) -> String {
    hex::encode(Sha1::digest(key.as_bytes()))
}

/// Big-endian bytes as an unsigned integer, mod [`MODULUS`].
fn reduce(bytes: &[u8]) -> u64 {
    let m = MODULUS as u128;
    let acc = bytes
        .iter()
        .fold(0u128, |acc, &b| ((acc << 8) | b as u128) % m);
    acc as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_matches_small_integers() {
        assert_eq!(reduce(&[]), 0);
        assert_eq!(reduce(&[0x01, 0x00]), 256);
        assert_eq!(reduce(&[0xff; 8]), u64::MAX % MODULUS);
    }

    #[test]
    fn reduce_wraps_at_modulus() {
        let bytes = MODULUS.to_be_bytes();
        assert_eq!(reduce(&bytes), 0);
        let bytes = (MODULUS + 7).to_be_bytes();
        assert_eq!(reduce(&bytes), 7);
    }
}

use std::fmt;
use std::str::FromStr;

use crate::HashError;

/// Length of a raw SHA-1 digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// Length of a full hex-encoded object id.
pub const HEX_LEN: usize = DIGEST_LEN * 2;

const HEX_ENCODE: &[u8; 16] = b"0123456789abcdef";

/// A git object identifier (SHA-1 digest).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; DIGEST_LEN]);

impl ObjectId {
    /// The null OID (all zeros).
    pub const NULL: Self = Self([0u8; DIGEST_LEN]);

    /// Create an ObjectId from raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != DIGEST_LEN {
            return Err(HashError::InvalidHashLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Parse a full 40-character hex string (either case).
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        if hex.len() != HEX_LEN {
            return Err(HashError::InvalidHexLength {
                expected: HEX_LEN,
                actual: hex.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        let raw = hex.as_bytes();
        for (i, byte) in arr.iter_mut().enumerate() {
            let hi = nibble(raw[i * 2], i * 2)?;
            let lo = nibble(raw[i * 2 + 1], i * 2 + 1)?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(arr))
    }

    /// Get the raw bytes of the hash.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if this is the null (all-zeros) OID.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Get the hex string representation (lowercase).
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(HEX_LEN);
        for &b in &self.0 {
            out.push(HEX_ENCODE[(b >> 4) as usize] as char);
            out.push(HEX_ENCODE[(b & 0x0f) as usize] as char);
        }
        out
    }

    /// Check if this OID's hex representation starts with the given hex prefix.
    pub fn starts_with_hex(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }
}

/// Whether `s` looks like an (abbreviated) hex object name.
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn nibble(c: u8, position: usize) -> Result<u8, HashError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(HashError::InvalidHex {
            position,
            character: c as char,
        }),
    }
}

impl From<[u8; DIGEST_LEN]> for ObjectId {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn display_matches_input() {
        let oid = ObjectId::from_hex(HEX).unwrap();
        assert_eq!(oid.to_string(), HEX);
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let oid = ObjectId::from_hex(&HEX.to_ascii_uppercase()).unwrap();
        assert_eq!(oid.to_hex(), HEX);
    }

    #[test]
    fn debug_shows_short_hash() {
        let oid: ObjectId = HEX.parse().unwrap();
        assert_eq!(format!("{:?}", oid), "ObjectId(da39a3ee)");
    }

    #[test]
    fn bad_length_rejected() {
        assert!(matches!(
            ObjectId::from_hex("abc"),
            Err(HashError::InvalidHexLength { expected: 40, actual: 3 })
        ));
    }

    #[test]
    fn bad_character_reports_position() {
        let mut bad = HEX.to_string();
        bad.replace_range(5..6, "z");
        assert!(matches!(
            ObjectId::from_hex(&bad),
            Err(HashError::InvalidHex { position: 5, character: 'z' })
        ));
    }

    #[test]
    fn null_oid() {
        assert!(ObjectId::NULL.is_null());
        assert!(!ObjectId::from_hex(HEX).unwrap().is_null());
    }

    #[test]
    fn prefix_matching_ignores_case() {
        let oid = ObjectId::from_hex(HEX).unwrap();
        assert!(oid.starts_with_hex("DA39"));
        assert!(!oid.starts_with_hex("da40"));
    }

    #[test]
    fn hex_predicate() {
        assert!(is_hex("deadBEEF"));
        assert!(!is_hex(""));
        assert!(!is_hex("main"));
    }
}

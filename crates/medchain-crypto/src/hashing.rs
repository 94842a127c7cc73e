use sha2::{Digest, Sha256};

/// Length of a hex encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// Genesis marker (no parent).
pub const ZERO_HASH_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash_has_digest_length() {
        assert_eq!(ZERO_HASH_HEX.len(), HASH_HEX_LEN);
        assert!(ZERO_HASH_HEX.chars().all(|c| c == '0'));
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_hex_digest_shape(data in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let digest = sha256_hex(&data);
            proptest::prop_assert_eq!(digest.len(), HASH_HEX_LEN);
            proptest::prop_assert!(digest.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
        }
    }

    #[test]
    fn test_sha256_is_deterministic() {
        assert_eq!(sha256(b"Mr. Black"), sha256(b"Mr. Black"));
        assert_ne!(sha256(b"Mr. Black"), sha256(b"Mr. Green"));
    }
}

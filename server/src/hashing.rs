//! Content hashing for uploads

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_single_byte_changes_hash() {
        assert_ne!(sha256_hex(b"image-a"), sha256_hex(b"image-b"));
        assert_eq!(sha256_hex(b"image-a").len(), 64);
    }
}

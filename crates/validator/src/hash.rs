//! Content hashing.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `content`.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn deterministic_and_sensitive() {
        assert_eq!(content_hash(b"register"), content_hash(b"register"));
        assert_ne!(content_hash(b"register"), content_hash(b"register "));
        assert_eq!(content_hash(b"x").len(), 64);
    }
}

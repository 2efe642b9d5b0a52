//! Session identifiers and bearer tokens
//!
//! The bearer token is handed to the client once. Only its SHA-256 digest is
//! persisted, so a leaked sessions table cannot be replayed.

use rand::Rng;
use sha2::{Digest, Sha256};

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LENGTH: usize = 48;

/// Public session identifier
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Random bearer token
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LENGTH)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Hex SHA-256 of a bearer token, as stored in `sessions.token`
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_token_digest() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(token_digest("abc").len(), 64);
    }

    #[test]
    fn test_session_id_is_uuid() {
        let id = new_session_id();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}

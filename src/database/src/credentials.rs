//! Webhook token generation and password hashing

use rand::RngCore;

use crate::DatabaseError;

/// Number of random bytes behind a webhook token (hex-encoded to 64 chars).
const WEBHOOK_TOKEN_BYTES: usize = 32;

/// Generate a fresh, unguessable webhook token.
pub fn generate_webhook_token() -> String {
    let mut bytes = [0u8; WEBHOOK_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a plaintext password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String, DatabaseError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| DatabaseError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_token_shape() {
        let token = generate_webhook_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_webhook_tokens_are_unique() {
        let first = generate_webhook_token();
        let second = generate_webhook_token();
        assert_ne!(first, second);
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(bcrypt::verify("hunter22", &hash).unwrap());
        assert!(!bcrypt::verify("hunter23", &hash).unwrap());
    }
}

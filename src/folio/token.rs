//! Password reset tokens.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

pub const DEFAULT_TOKEN_LENGTH: usize = 10;

/// Draw `length` characters uniformly from `[0-9A-Za-z]` using the OS RNG.
#[must_use]
pub fn generate(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[must_use]
pub fn expiry_from_now(minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(minutes)
}

#[must_use]
pub fn is_valid(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|expiry| now < expiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_alphanumeric_tokens_of_requested_length() {
        for length in [0, 1, DEFAULT_TOKEN_LENGTH, 64] {
            let token = generate(length);
            assert_eq!(token.len(), length);
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(generate(32), generate(32));
    }

    #[test]
    fn expiry_is_in_the_future() {
        let now = Utc::now();
        let expiry = expiry_from_now(60);
        assert!(expiry > now + Duration::minutes(59));
        assert!(is_valid(Some(expiry), now));
    }

    #[test]
    fn expired_or_missing_tokens_are_invalid() {
        let now = Utc::now();
        assert!(!is_valid(Some(now - Duration::seconds(1)), now));
        assert!(!is_valid(Some(now), now));
        assert!(!is_valid(None, now));
    }
}

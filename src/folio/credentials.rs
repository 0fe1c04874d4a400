//! Argon2id password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use std::sync::Arc;
use thiserror::Error;

/// Time cost used when none is configured.
pub const DEFAULT_HASH_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid hash cost {0}")]
    InvalidCost(u32),
    #[error("failed to hash password")]
    Hash,
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Secret hashed once at startup to give unknown logins a hash to verify
/// against.
const DUMMY_SECRET: &str = "folio-no-such-account";

/// One-way password hasher; every hash gets a fresh salt.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("t_cost", &self.params.t_cost())
            .field("m_cost", &self.params.m_cost())
            .finish()
    }
}

impl CredentialHasher {
    /// Build a hasher with the given Argon2 time cost.
    ///
    /// # Errors
    /// Returns [`CredentialError::InvalidCost`] when the cost is rejected by Argon2.
    pub fn new(cost: u32) -> Result<Self, CredentialError> {
        let params = Params::new(Params::DEFAULT_M_COST, cost, Params::DEFAULT_P_COST, None)
            .map_err(|_| CredentialError::InvalidCost(cost))?;
        let mut hasher = Self {
            params,
            dummy_hash: Arc::from(""),
        };
        hasher.dummy_hash = Arc::from(hasher.hash(DUMMY_SECRET)?);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `raw` into a PHC string.
    ///
    /// # Errors
    /// Returns [`CredentialError::Hash`] if Argon2 fails.
    pub fn hash(&self, raw: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(raw.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| CredentialError::Hash)
    }

    /// Check `raw` against a stored PHC string. Unparseable hashes never match.
    #[must_use]
    pub fn verify(&self, raw: &str, hashed: &str) -> bool {
        PasswordHash::new(hashed).is_ok_and(|parsed| {
            self.argon2()
                .verify_password(raw.as_bytes(), &parsed)
                .is_ok()
        })
    }

    /// Check `raw` against an account's stored hash. Without an account the
    /// dummy hash is verified instead so both paths cost the same, and the
    /// result is always `false`.
    #[must_use]
    pub fn verify_account(&self, raw: &str, hashed: Option<&str>) -> bool {
        match hashed {
            Some(hashed) => self.verify(raw, hashed),
            None => {
                let _ = self.verify(raw, &self.dummy_hash);
                false
            }
        }
    }

    /// Run `f` on the blocking pool so Argon2 does not stall the async workers.
    ///
    /// # Errors
    /// Returns [`CredentialError::Task`] if the blocking task panics or is cancelled.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, CredentialError>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialHasher) -> T + Send + 'static,
    {
        let hasher = self.clone();
        Ok(tokio::task::spawn_blocking(move || f(&hasher)).await?)
    }
}

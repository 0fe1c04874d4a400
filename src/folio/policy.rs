//! Password complexity and change rules.

use crate::folio::{credentials::CredentialHasher, validation::FieldPath};
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must have at least 8 characters, an uppercase letter, a digit and a symbol.")]
    Weak,
    #[error("New password must be different from the current one.")]
    Unchanged,
    #[error("Passwords do not match.")]
    Mismatch,
}

impl PolicyViolation {
    /// Form field the violation is reported on.
    #[must_use]
    pub fn field(self) -> FieldPath {
        match self {
            Self::Weak | Self::Unchanged => FieldPath::field("new_password"),
            Self::Mismatch => FieldPath::field("repeated_password"),
        }
    }
}

/// Minimum length, an ASCII uppercase letter, a digit and a symbol.
#[must_use]
pub fn is_strong(raw: &str) -> bool {
    raw.chars().count() >= MIN_PASSWORD_LENGTH
        && raw.chars().any(|c| c.is_ascii_uppercase())
        && raw.chars().any(|c| c.is_ascii_digit())
        && raw.chars().any(|c| !c.is_ascii_alphanumeric())
}

/// Check a password change. The first failing rule is reported.
///
/// # Errors
/// Returns the violated rule, checked as `Weak`, `Unchanged`, then `Mismatch`.
pub fn validate_change(
    hasher: &CredentialHasher,
    current_hash: &str,
    new_raw: &str,
    repeated_raw: &str,
) -> Result<(), PolicyViolation> {
    if !is_strong(new_raw) {
        return Err(PolicyViolation::Weak);
    }
    if hasher.verify(new_raw, current_hash) {
        return Err(PolicyViolation::Unchanged);
    }
    if new_raw != repeated_raw {
        return Err(PolicyViolation::Mismatch);
    }
    Ok(())
}

/// Check the initial password of a new account.
///
/// # Errors
/// Returns `Weak` or `Mismatch`.
pub fn validate_new(new_raw: &str, repeated_raw: &str) -> Result<(), PolicyViolation> {
    if !is_strong(new_raw) {
        return Err(PolicyViolation::Weak);
    }
    if new_raw != repeated_raw {
        return Err(PolicyViolation::Mismatch);
    }
    Ok(())
}

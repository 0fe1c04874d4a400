use crate::folio::{credentials::CredentialError, storage::StoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Request failures that are not rendered by the handler itself.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("record not found")]
    NotFound { fallback: &'static str },
    #[error("invalid identifier: {raw}")]
    InvalidIdentity {
        raw: String,
        fallback: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound { fallback } => Redirect::to(fallback).into_response(),
            Self::InvalidIdentity { raw, fallback } => {
                warn!("Invalid identifier {raw:?}, redirecting to {fallback}");
                Redirect::to(fallback).into_response()
            }
            Self::Store(StoreError::NotFound) => StatusCode::NOT_FOUND.into_response(),
            Self::Store(StoreError::Database(err)) => {
                error!("Database error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            Self::Credential(err) => {
                error!("Credential error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Parse a path identifier; malformed ids redirect to `fallback`.
///
/// # Errors
/// Returns [`AppError::InvalidIdentity`] when `raw` is not a UUID.
pub fn parse_identity(raw: &str, fallback: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidIdentity {
        raw: raw.to_string(),
        fallback,
    })
}

pub trait StoreResultExt<T> {
    /// Turn a missing record into a redirect to `fallback`.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] for missing records and [`AppError::Store`] otherwise.
    fn or_redirect(self, fallback: &'static str) -> Result<T, AppError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn or_redirect(self, fallback: &'static str) -> Result<T, AppError> {
        match self {
            Ok(value) => Ok(value),
            Err(StoreError::NotFound) => Err(AppError::NotFound { fallback }),
            Err(err) => Err(AppError::Store(err)),
        }
    }
}

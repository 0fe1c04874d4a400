//! Persistence contracts for CMS entities.
//!
//! Handlers only see these traits. [`postgres::PgRepository`] implements them
//! on `sqlx`; tests use an in-memory implementation.

pub mod models;
pub mod postgres;

pub use self::models::{
    Account, AccountDraft, PersonalData, Project, ProjectDraft, Role, SocialLink,
    SocialLinkDraft, TechStackPosition,
};

use crate::folio::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failure of a create or update.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for WriteError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<sqlx::Error> for WriteError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

pub trait ProjectStore: Send + Sync {
    /// Number of projects whose name or alternative name contains `filter`.
    fn count_projects(&self, filter: &str) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn find_projects(
        &self,
        filter: &str,
        offset: u64,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Project>, StoreError>> + Send;

    /// Names of every persisted project.
    fn project_names(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    fn get_project(&self, id: Uuid) -> impl Future<Output = Result<Project, StoreError>> + Send;

    fn create_project(
        &self,
        draft: ProjectDraft,
    ) -> impl Future<Output = Result<Project, WriteError>> + Send;

    fn update_project(
        &self,
        id: Uuid,
        draft: ProjectDraft,
    ) -> impl Future<Output = Result<Project, WriteError>> + Send;

    fn delete_project(&self, id: Uuid) -> impl Future<Output = Result<Project, StoreError>> + Send;
}

pub trait AccountStore: Send + Sync {
    fn count_accounts(&self, filter: &str) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn find_accounts(
        &self,
        filter: &str,
        offset: u64,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Account>, StoreError>> + Send;

    fn get_account(&self, id: Uuid) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// Lookup by login or email.
    fn find_account_by_identity(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    fn find_account_by_reset_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    fn create_account(
        &self,
        draft: AccountDraft,
    ) -> impl Future<Output = Result<Account, WriteError>> + Send;

    /// Store a new password hash, clear the first-login flag and any reset token.
    fn replace_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_account(&self, id: Uuid) -> impl Future<Output = Result<Account, StoreError>> + Send;
}

pub trait PersonalDataStore: Send + Sync {
    fn personal_data(
        &self,
    ) -> impl Future<Output = Result<Option<PersonalData>, StoreError>> + Send;

    fn save_personal_data(
        &self,
        data: PersonalData,
    ) -> impl Future<Output = Result<PersonalData, WriteError>> + Send;
}

pub trait SocialLinkStore: Send + Sync {
    /// Number of links whose paraphrase or URL contains `filter`.
    fn count_social_links(
        &self,
        filter: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn find_social_links(
        &self,
        filter: &str,
        offset: u64,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<SocialLink>, StoreError>> + Send;

    fn get_social_link(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<SocialLink, StoreError>> + Send;

    fn create_social_link(
        &self,
        draft: SocialLinkDraft,
    ) -> impl Future<Output = Result<SocialLink, WriteError>> + Send;

    fn update_social_link(
        &self,
        id: Uuid,
        draft: SocialLinkDraft,
    ) -> impl Future<Output = Result<SocialLink, WriteError>> + Send;

    fn delete_social_link(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<SocialLink, StoreError>> + Send;
}

/// Everything the CMS persists.
pub trait Repository:
    ProjectStore + AccountStore + PersonalDataStore + SocialLinkStore + Clone + 'static
{
    /// Liveness check used by `/health`.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Escape `%`, `_` and `\` so a user filter matches literally inside `ILIKE`.
#[must_use]
pub fn like_pattern(filter: &str) -> String {
    let mut pattern = String::with_capacity(filter.len() + 2);
    pattern.push('%');
    for c in filter.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

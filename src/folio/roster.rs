//! GitHub repositories that are not imported as projects yet.

use crate::folio::storage::{ProjectStore, StoreError};
use serde::Serialize;
use std::{collections::HashSet, future::Future};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub external_id: i64,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid API url: {0}")]
    InvalidUrl(String),
}

/// Listing of the configured account's repositories.
pub trait RepositorySource: Clone + Send + Sync + 'static {
    /// Every repository of the account, in listing order.
    fn list_repositories(
        &self,
    ) -> impl Future<Output = Result<Vec<RosterEntry>, ExternalServiceError>> + Send;

    /// Repository id for `name`, `None` when the account has no such repository.
    fn repository_id(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<i64>, ExternalServiceError>> + Send;
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error(transparent)]
    External(#[from] ExternalServiceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Listing entries whose name is neither persisted nor `exclude`.
///
/// `exclude` is the name of the project being edited; it is offered
/// separately by the update form. Listing order is kept.
///
/// # Errors
/// Returns the first failure of either fetch; the listing is never
/// replaced by an empty one.
pub async fn reconcile<S, P>(
    source: &S,
    store: &P,
    exclude: Option<&str>,
) -> Result<Vec<RosterEntry>, RosterError>
where
    S: RepositorySource,
    P: ProjectStore,
{
    let (listing, persisted) = tokio::join!(source.list_repositories(), store.project_names());
    let listing = listing?;
    let mut taken: HashSet<String> = persisted?.into_iter().collect();
    if let Some(name) = exclude {
        taken.insert(name.to_string());
    }

    Ok(listing
        .into_iter()
        .filter(|entry| !taken.contains(&entry.name))
        .collect())
}

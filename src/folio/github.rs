//! GitHub REST client backing the project roster.

use crate::folio::roster::{ExternalServiceError, RepositorySource, RosterEntry};
use crate::APP_USER_AGENT;
use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    id: i64,
    name: String,
}

impl From<RepositoryPayload> for RosterEntry {
    fn from(payload: RepositoryPayload) -> Self {
        Self {
            external_id: payload.id,
            name: payload.name,
        }
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    account: String,
    token: SecretString,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url.as_str())
            .field("account", &self.account)
            .field("token", &"***")
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// # Errors
    /// Returns an error if the API URL is invalid or the HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        account: impl Into<String>,
        token: SecretString,
    ) -> Result<Self, ExternalServiceError> {
        let api_url =
            Url::parse(api_url).map_err(|e| ExternalServiceError::InvalidUrl(e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(ExternalServiceError::InvalidUrl(api_url.to_string()));
        }
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|source| ExternalServiceError::Transport {
                url: api_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            api_url,
            account: account.into(),
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ExternalServiceError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| ExternalServiceError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ExternalServiceError> {
        self.client
            .get(url.clone())
            .bearer_auth(self.token.expose_secret())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|source| ExternalServiceError::Transport {
                url: url.to_string(),
                source,
            })
    }

    async fn list_page(&self, page: usize) -> Result<Vec<RosterEntry>, ExternalServiceError> {
        let mut url = self.endpoint(&["users", self.account.as_str(), "repos"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());

        let response = self.get(url.clone()).await?;
        if !response.status().is_success() {
            return Err(ExternalServiceError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let payload: Vec<RepositoryPayload> =
            response
                .json()
                .await
                .map_err(|source| ExternalServiceError::Decode {
                    url: url.to_string(),
                    source,
                })?;
        Ok(payload.into_iter().map(RosterEntry::from).collect())
    }
}

impl RepositorySource for GitHubClient {
    #[instrument(skip(self), fields(account = %self.account))]
    async fn list_repositories(&self) -> Result<Vec<RosterEntry>, ExternalServiceError> {
        let mut repositories = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_page(page).await?;
            let last = batch.len() < PER_PAGE;
            repositories.extend(batch);
            if last {
                break;
            }
            page += 1;
        }
        debug!("listed {} repositories", repositories.len());
        Ok(repositories)
    }

    #[instrument(skip(self), fields(account = %self.account))]
    async fn repository_id(&self, name: &str) -> Result<Option<i64>, ExternalServiceError> {
        let url = self.endpoint(&["repos", self.account.as_str(), name])?;
        let response = self.get(url.clone()).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let payload: RepositoryPayload =
                    response
                        .json()
                        .await
                        .map_err(|source| ExternalServiceError::Decode {
                            url: url.to_string(),
                            source,
                        })?;
                Ok(Some(payload.id))
            }
            status => Err(ExternalServiceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

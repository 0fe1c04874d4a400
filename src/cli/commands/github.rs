use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::folio::github::DEFAULT_GITHUB_API_URL;

pub const ARG_GITHUB_ACCOUNT: &str = "github-account";
pub const ARG_GITHUB_TOKEN: &str = "github-token";
pub const ARG_GITHUB_API_URL: &str = "github-api-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub account: String,
    pub token: SecretString,
    pub api_url: String,
}

impl Options {
    /// Parse GitHub arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the account or the token is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(account) = get_non_empty(ARG_GITHUB_ACCOUNT) else {
            anyhow::bail!("missing required argument: --{ARG_GITHUB_ACCOUNT}");
        };
        let Some(token) = get_non_empty(ARG_GITHUB_TOKEN) else {
            anyhow::bail!("missing required argument: --{ARG_GITHUB_TOKEN}");
        };

        Ok(Self {
            account,
            token: SecretString::from(token),
            api_url: get_non_empty(ARG_GITHUB_API_URL)
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GITHUB_ACCOUNT)
                .long(ARG_GITHUB_ACCOUNT)
                .help("GitHub account whose repositories can be imported as projects")
                .env("FOLIO_GITHUB_ACCOUNT"),
        )
        .arg(
            Arg::new(ARG_GITHUB_TOKEN)
                .long(ARG_GITHUB_TOKEN)
                .help("GitHub API token")
                .env("FOLIO_GITHUB_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GITHUB_API_URL)
                .long(ARG_GITHUB_API_URL)
                .help("GitHub API base URL")
                .env("FOLIO_GITHUB_API_URL")
                .default_value(DEFAULT_GITHUB_API_URL),
        )
}

//! Maps validated CLI arguments to an action.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, github, ARG_ASSETS_DIR, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let assets_dir = matches
        .get_one::<String>(ARG_ASSETS_DIR)
        .cloned()
        .unwrap_or_else(|| "public".to_string());

    let github_opts = github::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        assets_dir,
        github_account: github_opts.account,
        github_token: github_opts.token,
        github_api_url: github_opts.api_url,
        session_secret: auth_opts.session_secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        hash_cost: auth_opts.hash_cost,
        reset_token_ttl_minutes: auth_opts.reset_token_ttl_minutes,
        admin: auth_opts.admin,
    }))
}

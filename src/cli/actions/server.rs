use crate::{
    cli::commands::auth::AdminOptions,
    folio::{self, github::GitHubClient, AdminBootstrap, CmsConfig},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub assets_dir: String,
    pub github_account: String,
    pub github_token: SecretString,
    pub github_api_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub hash_cost: u32,
    pub reset_token_ttl_minutes: i64,
    pub admin: Option<AdminOptions>,
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        assets_dir = %args.assets_dir,
        github_account = %args.github_account,
        github_api_url = %args.github_api_url,
        session_ttl_seconds = args.session_ttl_seconds,
        hash_cost = args.hash_cost,
        reset_token_ttl_minutes = args.reset_token_ttl_minutes,
        admin_bootstrap = args.admin.is_some(),
        "Starting server"
    );
}

/// Execute the server action.
/// # Errors
/// Returns an error if the GitHub client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let github = GitHubClient::new(&args.github_api_url, args.github_account, args.github_token)
        .context("Failed to build GitHub client")?;

    let config = CmsConfig::new()
        .with_assets_dir(args.assets_dir)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_hash_cost(args.hash_cost)
        .with_reset_token_ttl_minutes(args.reset_token_ttl_minutes);

    let admin = args.admin.map(|admin| AdminBootstrap {
        login: admin.login,
        email: admin.email,
        password: admin.password,
    });

    folio::new(args.port, args.dsn, args.session_secret, github, config, admin).await
}

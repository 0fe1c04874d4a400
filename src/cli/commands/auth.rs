use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_HASH_COST: &str = "hash-cost";
pub const ARG_RESET_TOKEN_TTL_MINUTES: &str = "reset-token-ttl-minutes";
pub const ARG_ADMIN_LOGIN: &str = "admin-login";
pub const ARG_ADMIN_EMAIL: &str = "admin-email";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";

#[derive(Debug, Clone)]
pub struct AdminOptions {
    pub login: String,
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub hash_cost: u32,
    pub reset_token_ttl_minutes: i64,
    pub admin: Option<AdminOptions>,
}

impl Options {
    /// Parse session, credential and admin bootstrap arguments.
    ///
    /// # Errors
    /// Returns an error if the session secret is missing or the admin
    /// arguments are only partially set.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(session_secret) = get_non_empty(ARG_SESSION_SECRET) else {
            anyhow::bail!("missing required argument: --{ARG_SESSION_SECRET}");
        };

        let admin = match (
            get_non_empty(ARG_ADMIN_LOGIN),
            get_non_empty(ARG_ADMIN_EMAIL),
            get_non_empty(ARG_ADMIN_PASSWORD),
        ) {
            (Some(login), Some(email), Some(password)) => Some(AdminOptions {
                login,
                email,
                password: SecretString::from(password),
            }),
            (None, None, None) => None,
            _ => anyhow::bail!(
                "--{ARG_ADMIN_LOGIN}, --{ARG_ADMIN_EMAIL} and --{ARG_ADMIN_PASSWORD} must be set together"
            ),
        };

        Ok(Self {
            session_secret: SecretString::from(session_secret),
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(86400),
            hash_cost: matches.get_one::<u32>(ARG_HASH_COST).copied().unwrap_or(10),
            reset_token_ttl_minutes: matches
                .get_one::<i64>(ARG_RESET_TOKEN_TTL_MINUTES)
                .copied()
                .unwrap_or(60),
            admin,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_admin_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret mixed into session keys")
                .env("FOLIO_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Idle session lifetime in seconds")
                .env("FOLIO_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_HASH_COST)
                .long(ARG_HASH_COST)
                .help("Argon2 time cost for password hashes")
                .env("FOLIO_HASH_COST")
                .default_value("10")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_MINUTES)
                .long(ARG_RESET_TOKEN_TTL_MINUTES)
                .help("Password change link lifetime in minutes")
                .env("FOLIO_RESET_TOKEN_TTL_MINUTES")
                .default_value("60")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}

fn with_admin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_LOGIN)
                .long(ARG_ADMIN_LOGIN)
                .help("Login of the admin created when no account exists")
                .env("FOLIO_ADMIN_LOGIN"),
        )
        .arg(
            Arg::new(ARG_ADMIN_EMAIL)
                .long(ARG_ADMIN_EMAIL)
                .help("Email of the admin created when no account exists")
                .env("FOLIO_ADMIN_EMAIL"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Initial password of the admin created when no account exists")
                .env("FOLIO_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
}

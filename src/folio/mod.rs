pub mod alerts;
pub mod credentials;
pub mod error;
pub mod github;
pub mod handlers;
pub mod pagination;
pub mod policy;
pub mod render;
pub mod roster;
pub mod session;
pub mod state;
pub mod storage;
pub mod token;
pub mod validation;

pub use self::state::{AppState, CmsConfig};

use crate::folio::{
    credentials::CredentialHasher,
    github::GitHubClient,
    handlers::{
        accounts, auth, guard, health, personal_data, projects, social_links, ACCOUNTS,
        FIRST_LOGIN, LOGIN, PERSONAL_DATA, PROJECTS, REQUEST_CHANGE_PASSWORD, SOCIAL_LINKS,
    },
    roster::RepositorySource,
    session::{session_layer, SessionStore},
    storage::{postgres, AccountDraft, AccountStore, Repository, Role, WriteError},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    response::Redirect,
    routing::get,
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info, info_span, Span};
use ulid::Ulid;

/// Administrator created at startup when no account exists yet.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub login: String,
    pub email: String,
    pub password: SecretString,
}

/// Build the CMS router. Assets and `/health` sit outside the session layer.
pub fn router<R, G>(state: AppState<R, G>) -> Router
where
    R: Repository,
    G: RepositorySource,
{
    let public = Router::<AppState<R, G>>::new()
        .route(LOGIN, get(auth::login_form).post(auth::login::<R, G>))
        .route(
            REQUEST_CHANGE_PASSWORD,
            get(auth::request_change_password_form).post(auth::request_change_password::<R, G>),
        )
        .route(
            "/cms/change-password/{token}",
            get(auth::change_password_form::<R, G>).post(auth::change_password::<R, G>),
        )
        .route_layer(middleware::from_fn(guard::redirect_logged));

    let logged = Router::<AppState<R, G>>::new()
        .route(
            FIRST_LOGIN,
            get(auth::first_login_form).post(auth::first_login::<R, G>),
        )
        .route("/cms/logout", get(auth::logout))
        .route_layer(middleware::from_fn(guard::require_login));

    let admin = Router::<AppState<R, G>>::new()
        .route(ACCOUNTS, get(accounts::list::<R, G>))
        .route(
            "/cms/accounts/add",
            get(accounts::add_form).post(accounts::add::<R, G>),
        )
        .route("/cms/accounts/delete/{id}", get(accounts::delete::<R, G>))
        .route_layer(middleware::from_fn(guard::require_admin));

    // Layers run bottom-up: login, then first-login check, then admin check.
    let cms = Router::<AppState<R, G>>::new()
        .route(PROJECTS, get(projects::list::<R, G>))
        .route(
            "/cms/projects/add",
            get(projects::add_form::<R, G>).post(projects::add::<R, G>),
        )
        .route(
            "/cms/projects/update/{id}",
            get(projects::update_form::<R, G>).post(projects::update::<R, G>),
        )
        .route("/cms/projects/delete/{id}", get(projects::delete::<R, G>))
        .route(
            PERSONAL_DATA,
            get(personal_data::edit_form::<R, G>).post(personal_data::save::<R, G>),
        )
        .route(SOCIAL_LINKS, get(social_links::list::<R, G>))
        .route(
            "/cms/social-links/add",
            get(social_links::add_form).post(social_links::add::<R, G>),
        )
        .route(
            "/cms/social-links/update/{id}",
            get(social_links::update_form::<R, G>).post(social_links::update::<R, G>),
        )
        .route(
            "/cms/social-links/delete/{id}",
            get(social_links::delete::<R, G>),
        )
        .merge(admin)
        .route_layer(middleware::from_fn(guard::require_active))
        .route_layer(middleware::from_fn(guard::require_login));

    let assets = ServeDir::new(state.config.assets_dir());

    Router::new()
        .route("/", get(|| async { Redirect::to(PROJECTS) }))
        .merge(public)
        .merge(logged)
        .merge(cms)
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            session_layer,
        ))
        .route("/health", get(health::health::<R, G>))
        .nest_service("/assets", assets)
        .with_state(state)
}

/// Create the configured administrator if the accounts table is empty.
///
/// # Errors
/// Returns an error if the store fails or the admin values are invalid.
pub async fn bootstrap_admin<S: AccountStore>(
    store: &S,
    hasher: &CredentialHasher,
    admin: AdminBootstrap,
) -> Result<()> {
    if store.count_accounts("").await? > 0 {
        debug!("Accounts exist, skipping admin bootstrap");
        return Ok(());
    }

    let password = admin.password.expose_secret();
    policy::validate_new(password, password)
        .map_err(|violation| anyhow!("Invalid admin password: {violation}"))?;

    let secret = admin.password.clone();
    let password_hash = hasher
        .blocking(move |hasher| hasher.hash(secret.expose_secret()))
        .await??;
    let draft = AccountDraft {
        login: admin.login,
        email: admin.email,
        role: Role::Admin,
        password_hash,
    };

    match store.create_account(draft).await {
        Ok(account) => {
            info!(login = %account.login, "Created initial admin account");
            Ok(())
        }
        Err(WriteError::Validation(errors)) => Err(anyhow!("Invalid admin account: {errors}")),
        Err(WriteError::Store(err)) => Err(err).context("Failed to create admin account"),
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    session_secret: SecretString,
    github: GitHubClient,
    config: CmsConfig,
    admin: Option<AdminBootstrap>,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    postgres::apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let repository = postgres::PgRepository::new(pool);
    let hasher = CredentialHasher::new(config.hash_cost()).context("Invalid hash cost")?;

    if let Some(admin) = admin {
        bootstrap_admin(&repository, &hasher, admin).await?;
    }

    let sessions = SessionStore::new(session_secret, config.session_ttl());
    let state = AppState::new(repository, github, hasher, sessions, config);

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

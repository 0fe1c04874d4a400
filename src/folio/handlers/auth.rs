//! Login, logout, forced first-login password change and password reset.

use super::{
    redirect_with_alert, FormFields, FormState, FIRST_LOGIN, LOGIN, PROJECTS, REQUEST_CHANGE_PASSWORD,
};
use crate::folio::{
    alerts::{Alert, AlertSlot},
    error::AppError,
    policy::{self, PolicyViolation},
    render::Page,
    roster::RepositorySource,
    session::{Session, SessionUser},
    storage::{Account, Repository, StoreError},
    token,
    validation::{FieldPath, ValidationErrors},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

const INVALID_CREDENTIALS: &str = "Invalid login or password.";
const INVALID_RESET_LINK: &str = "Password change link is invalid or has expired.";

fn login_page(identity: &str, state: FormState) -> Page {
    Page::new("cms/login", "Login")
        .with("form", json!({ "identity": identity }))
        .with("errors", state.errors)
        .with("alert", state.alert)
}

fn password_page(template: &'static str, title: &str, state: FormState) -> Page {
    Page::new(template, title)
        .with("errors", state.errors)
        .with("alert", state.alert)
}

fn violation_errors(violation: PolicyViolation) -> ValidationErrors {
    ValidationErrors::single(violation.field(), violation.to_string())
}

fn session_user(account: &Account) -> SessionUser {
    SessionUser {
        id: account.id,
        login: account.login.clone(),
        role: account.role,
        is_first_login: account.is_first_login,
    }
}

/// `GET /cms/login`
pub async fn login_form(Extension(session): Extension<Session>) -> Response {
    let alert = session.take_alert(AlertSlot::LoginPage).await;
    login_page("", FormState::with_alert(alert)).into_response()
}

/// `POST /cms/login`
#[instrument(skip_all)]
pub async fn login<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let fields = FormFields::new(fields);
    let identity = fields.value("identity");
    let password = fields.raw("password");

    let mut errors = ValidationErrors::new();
    errors.require(&identity, FieldPath::field("identity"), "Login or email");
    errors.require(&password, FieldPath::field("password"), "Password");
    if !errors.is_empty() {
        let page = login_page(&identity, FormState::with_errors(errors));
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    let account = state
        .repository
        .find_account_by_identity(&identity)
        .await?;
    let stored_hash = account.as_ref().map(|account| account.password_hash.clone());
    let verified = state
        .hasher
        .blocking(move |hasher| hasher.verify_account(&password, stored_hash.as_deref()))
        .await?;
    let account = account.filter(|_| verified);

    let Some(account) = account else {
        warn!("Failed login attempt for {identity}");
        let page = login_page(
            &identity,
            FormState::with_alert(Some(Alert::danger(INVALID_CREDENTIALS))),
        );
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    };

    info!(login = %account.login, "User logged in");
    session.set_user(session_user(&account)).await;

    let target = if account.is_first_login {
        FIRST_LOGIN
    } else {
        PROJECTS
    };
    Ok(Redirect::to(target).into_response())
}

/// `GET /cms/logout`
pub async fn logout(
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
) -> Response {
    session.destroy().await;
    info!(login = %user.login, "User logged out");
    redirect_with_alert(
        &session,
        AlertSlot::LoginPage,
        Alert::success("You have been successfully logged out."),
        LOGIN,
    )
    .await
}

/// `GET /cms/first-login`
pub async fn first_login_form(Extension(user): Extension<SessionUser>) -> Response {
    if !user.is_first_login {
        return Redirect::to(PROJECTS).into_response();
    }
    password_page("cms/first-login", "Change password", FormState::default())
        .with("user", &user)
        .into_response()
}

/// `POST /cms/first-login`
#[instrument(skip_all)]
pub async fn first_login<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    if !user.is_first_login {
        return Ok(Redirect::to(PROJECTS).into_response());
    }

    let account = match state.repository.get_account(user.id).await {
        Ok(account) => account,
        Err(StoreError::NotFound) => {
            warn!(login = %user.login, "Logged account no longer exists");
            session.clear_user().await;
            return Ok(Redirect::to(LOGIN).into_response());
        }
        Err(err) => return Err(err.into()),
    };

    let fields = FormFields::new(fields);
    let new_password = fields.raw("new_password");
    let repeated_password = fields.raw("repeated_password");

    let current_hash = account.password_hash.clone();
    let checked = state
        .hasher
        .blocking(move |hasher| {
            policy::validate_change(hasher, &current_hash, &new_password, &repeated_password)
                .map(|()| hasher.hash(&new_password))
        })
        .await?;
    let password_hash = match checked {
        Ok(hashed) => hashed?,
        Err(violation) => {
            debug!(login = %user.login, "Rejected first-login password: {violation}");
            let page = password_page(
                "cms/first-login",
                "Change password",
                FormState::with_errors(violation_errors(violation)),
            )
            .with("user", &user);
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    state
        .repository
        .replace_password(account.id, &password_hash)
        .await?;
    session.complete_first_login().await;
    info!(login = %account.login, "Initial password replaced");

    Ok(redirect_with_alert(
        &session,
        AlertSlot::CmsProjectsPage,
        Alert::success("Your password has been successfully changed."),
        PROJECTS,
    )
    .await)
}

/// `GET /cms/request-change-password`
pub async fn request_change_password_form(Extension(session): Extension<Session>) -> Response {
    let alert = session
        .take_alert(AlertSlot::RequestChangePasswordPage)
        .await;
    password_page(
        "cms/request-change-password",
        "Reset password",
        FormState::with_alert(alert),
    )
    .into_response()
}

/// `POST /cms/request-change-password`
///
/// Answers the same way whether or not the account exists.
#[instrument(skip_all)]
pub async fn request_change_password<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let identity = FormFields::new(fields).value("identity");

    let mut errors = ValidationErrors::new();
    if !errors.require(&identity, FieldPath::field("identity"), "Login or email") {
        let page = password_page(
            "cms/request-change-password",
            "Reset password",
            FormState::with_errors(errors),
        );
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    match state.repository.find_account_by_identity(&identity).await? {
        Some(account) => {
            let reset_token = token::generate(token::DEFAULT_TOKEN_LENGTH);
            let expires_at = token::expiry_from_now(state.config.reset_token_ttl_minutes());
            state
                .repository
                .set_reset_token(account.id, &reset_token, expires_at)
                .await?;
            // Delivery is the log line.
            info!(
                login = %account.login,
                email = %account.email,
                %expires_at,
                "Password change link: /cms/change-password/{reset_token}"
            );
        }
        None => debug!("Password change requested for unknown account {identity}"),
    }

    Ok(redirect_with_alert(
        &session,
        AlertSlot::RequestChangePasswordPage,
        Alert::success("If the account exists, a password change link has been sent."),
        REQUEST_CHANGE_PASSWORD,
    )
    .await)
}

/// Account holding a reset token that has not expired yet.
async fn reset_account<R: Repository>(
    repository: &R,
    reset_token: &str,
) -> Result<Option<Account>, AppError> {
    let account = repository.find_account_by_reset_token(reset_token).await?;
    Ok(account.filter(|account| token::is_valid(account.reset_token_expires_at, Utc::now())))
}

async fn invalid_reset_link(session: &Session) -> Response {
    redirect_with_alert(
        session,
        AlertSlot::RequestChangePasswordPage,
        Alert::danger(INVALID_RESET_LINK),
        REQUEST_CHANGE_PASSWORD,
    )
    .await
}

/// `GET /cms/change-password/{token}`
pub async fn change_password_form<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Path(reset_token): Path<String>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    if reset_account(&state.repository, &reset_token).await?.is_none() {
        return Ok(invalid_reset_link(&session).await);
    }
    Ok(password_page("cms/change-password", "Change password", FormState::default())
        .with("token", &reset_token)
        .into_response())
}

/// `POST /cms/change-password/{token}`
#[instrument(skip_all)]
pub async fn change_password<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Path(reset_token): Path<String>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let Some(account) = reset_account(&state.repository, &reset_token).await? else {
        return Ok(invalid_reset_link(&session).await);
    };

    let fields = FormFields::new(fields);
    let new_password = fields.raw("new_password");
    let repeated_password = fields.raw("repeated_password");

    let current_hash = account.password_hash.clone();
    let checked = state
        .hasher
        .blocking(move |hasher| {
            policy::validate_change(hasher, &current_hash, &new_password, &repeated_password)
                .map(|()| hasher.hash(&new_password))
        })
        .await?;
    let password_hash = match checked {
        Ok(hashed) => hashed?,
        Err(violation) => {
            let page = password_page(
                "cms/change-password",
                "Change password",
                FormState::with_errors(violation_errors(violation)),
            )
            .with("token", &reset_token);
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    state
        .repository
        .replace_password(account.id, &password_hash)
        .await?;
    info!(login = %account.login, "Password changed through reset link");

    Ok(redirect_with_alert(
        &session,
        AlertSlot::LoginPage,
        Alert::success("Your password has been changed. You can log in now."),
        LOGIN,
    )
    .await)
}

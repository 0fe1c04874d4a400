//! Access guards applied as route layers.
//!
//! They run inside the session layer, so every request carries a
//! [`Session`] extension by the time a guard sees it.

use super::{FIRST_LOGIN, LOGIN, PROJECTS};
use crate::folio::{
    session::{Session, SessionUser},
    storage::Role,
};
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error};

fn request_session(request: &Request) -> Result<Session, Response> {
    request.extensions().get::<Session>().cloned().ok_or_else(|| {
        error!("session layer missing in front of access guard");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

// The request body is not `Sync`, so the session is cloned out before awaiting.
async fn session_user(session: Result<Session, Response>) -> Result<Option<SessionUser>, Response> {
    Ok(session?.user().await)
}

/// Keep logged users away from the login and password reset pages.
pub async fn redirect_logged(request: Request, next: Next) -> Response {
    match session_user(request_session(&request)).await {
        Err(response) => response,
        Ok(Some(user)) if user.is_first_login => Redirect::to(FIRST_LOGIN).into_response(),
        Ok(Some(_)) => Redirect::to(PROJECTS).into_response(),
        Ok(None) => next.run(request).await,
    }
}

/// Require a logged user and expose it as a [`SessionUser`] extension.
pub async fn require_login(mut request: Request, next: Next) -> Response {
    match session_user(request_session(&request)).await {
        Err(response) => response,
        Ok(None) => {
            debug!("anonymous request to {}", request.uri().path());
            Redirect::to(LOGIN).into_response()
        }
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
    }
}

/// Send users that still have to replace their initial password to the
/// first-login form. Runs after [`require_login`].
pub async fn require_active(request: Request, next: Next) -> Response {
    let user = request.extensions().get::<SessionUser>().cloned();
    match user {
        Some(user) if user.is_first_login => Redirect::to(FIRST_LOGIN).into_response(),
        Some(_) => next.run(request).await,
        None => Redirect::to(LOGIN).into_response(),
    }
}

/// Account management is reserved to administrators. Runs after [`require_login`].
pub async fn require_admin(request: Request, next: Next) -> Response {
    let user = request.extensions().get::<SessionUser>().cloned();
    match user {
        Some(user) if user.role == Role::Admin => next.run(request).await,
        Some(user) => {
            debug!(login = %user.login, "non-admin denied account management");
            Redirect::to(PROJECTS).into_response()
        }
        None => Redirect::to(LOGIN).into_response(),
    }
}

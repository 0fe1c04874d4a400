//! CMS account management, reserved to administrators.

use super::{
    listing_page, paginate, redirect_with_alert, FormFields, FormState, Listing, ACCOUNTS,
};
use crate::folio::{
    alerts::{Alert, AlertSlot},
    error::{parse_identity, AppError},
    pagination::{PageQuery, PageRequest},
    policy,
    render::Page,
    roster::RepositorySource,
    session::{Session, SessionUser},
    storage::{AccountDraft, Repository, Role, StoreError, WriteError},
    validation::{FieldPath, ValidationErrors},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

const ROLES: [Role; 2] = [Role::Admin, Role::Moderator];

#[derive(Debug, Clone, Serialize)]
struct AccountForm {
    login: String,
    email: String,
    role: String,
}

impl Default for AccountForm {
    fn default() -> Self {
        Self {
            login: String::new(),
            email: String::new(),
            role: Role::Moderator.to_string(),
        }
    }
}

fn form_page(user: &SessionUser, form: &AccountForm, state: FormState) -> Page {
    Page::new("cms/account-form", "Add account")
        .with("user", user)
        .with("form", form)
        .with("roles", ROLES)
        .with("errors", state.errors)
        .with("alert", state.alert)
}

/// `GET /cms/accounts`
#[instrument(skip_all)]
pub async fn list<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let request = PageRequest::from(query);
    let repository = &state.repository;
    let listing = paginate(
        ACCOUNTS,
        &request,
        |filter| async move { repository.count_accounts(&filter).await },
        |filter, offset, limit| async move {
            repository.find_accounts(&filter, offset, limit).await
        },
    )
    .await?;

    match listing {
        Listing::Redirect(url) => Ok(Redirect::to(&url).into_response()),
        Listing::Render(page, accounts) => {
            let alert = session.take_alert(AlertSlot::CmsAccountsPage).await;
            Ok(listing_page(
                "cms/accounts",
                "Accounts",
                "accounts",
                &page,
                &accounts,
                alert,
                &user,
            )
            .into_response())
        }
    }
}

/// `GET /cms/accounts/add`
pub async fn add_form(Extension(user): Extension<SessionUser>) -> Response {
    form_page(&user, &AccountForm::default(), FormState::default()).into_response()
}

/// `POST /cms/accounts/add`
///
/// New accounts start with the first-login flag set, so the initial password
/// is replaced at the first login.
#[instrument(skip_all)]
pub async fn add<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let fields = FormFields::new(fields);
    let form = AccountForm {
        login: fields.value("login"),
        email: fields.value("email"),
        role: fields.value("role"),
    };
    let password = fields.raw("password");
    let repeated_password = fields.raw("repeated_password");

    let mut errors = ValidationErrors::new();
    let role = form.role.parse::<Role>().unwrap_or_else(|_| {
        errors.add(FieldPath::field("role"), "Role is invalid.");
        Role::Moderator
    });
    let mut draft = AccountDraft {
        login: form.login.clone(),
        email: form.email.clone(),
        role,
        password_hash: String::new(),
    };
    if let Err(draft_errors) = draft.validate() {
        errors.merge(draft_errors);
    }
    if let Err(violation) = policy::validate_new(&password, &repeated_password) {
        errors.add(violation.field(), violation.to_string());
    }

    let result = if errors.is_empty() {
        draft.password_hash = state
            .hasher
            .blocking(move |hasher| hasher.hash(&password))
            .await??;
        state.repository.create_account(draft).await
    } else {
        Err(WriteError::Validation(errors))
    };

    match result {
        Ok(account) => {
            info!(login = %account.login, role = %account.role, "Account created");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsAccountsPage,
                Alert::success(format!("Account {} was successfully created.", account.login)),
                ACCOUNTS,
            )
            .await)
        }
        Err(WriteError::Validation(errors)) => {
            warn!("Failure creating account: {errors}");
            let page = form_page(&user, &form, FormState::with_errors(errors));
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(WriteError::Store(err)) => {
            error!("Failure creating account: {err}");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsAccountsPage,
                Alert::danger("Account could not be created."),
                ACCOUNTS,
            )
            .await)
        }
    }
}

/// `GET /cms/accounts/delete/{id}`
#[instrument(skip_all)]
pub async fn delete<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let id = parse_identity(&raw_id, ACCOUNTS)?;
    if id == user.id {
        warn!(login = %user.login, "Refused to remove the logged account");
        return Ok(redirect_with_alert(
            &session,
            AlertSlot::CmsAccountsPage,
            Alert::danger("You cannot remove your own account."),
            ACCOUNTS,
        )
        .await);
    }

    let alert = match state.repository.delete_account(id).await {
        Ok(account) => {
            info!(login = %account.login, "Account removed");
            Alert::success(format!("Account {} was successfully removed.", account.login))
        }
        Err(StoreError::NotFound) => return Ok(Redirect::to(ACCOUNTS).into_response()),
        Err(err) => {
            error!("Failure removing account: {err}");
            Alert::danger("Account could not be removed.")
        }
    };
    Ok(redirect_with_alert(&session, AlertSlot::CmsAccountsPage, alert, ACCOUNTS).await)
}

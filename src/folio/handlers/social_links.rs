use super::{
    listing_page, paginate, redirect_with_alert, FormFields, FormState, Listing, SOCIAL_LINKS,
};
use crate::folio::{
    alerts::{Alert, AlertSlot},
    error::{parse_identity, AppError, StoreResultExt},
    pagination::{PageQuery, PageRequest},
    render::Page,
    roster::RepositorySource,
    session::{Session, SessionUser},
    storage::{Repository, SocialLinkDraft, StoreError, WriteError},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use tracing::{error, info, instrument, warn};

fn draft_from(fields: Vec<(String, String)>) -> SocialLinkDraft {
    let fields = FormFields::new(fields);
    SocialLinkDraft {
        paraphrase: fields.value("paraphrase"),
        link: fields.value("link"),
        icon_class: fields.value("icon_class"),
    }
}

fn form_page(title: &str, user: &SessionUser, draft: &SocialLinkDraft, state: FormState) -> Page {
    Page::new("cms/social-link-form", title)
        .with("user", user)
        .with("form", draft)
        .with("errors", state.errors)
        .with("alert", state.alert)
}

fn invalid_form(title: &str, user: &SessionUser, draft: &SocialLinkDraft, state: FormState) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        form_page(title, user, draft, state),
    )
        .into_response()
}

/// `GET /cms/social-links`
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
        SOCIAL_LINKS,
        &request,
        |filter| async move { repository.count_social_links(&filter).await },
        |filter, offset, limit| async move {
            repository.find_social_links(&filter, offset, limit).await
        },
    )
    .await?;

    match listing {
        Listing::Redirect(url) => Ok(Redirect::to(&url).into_response()),
        Listing::Render(page, links) => {
            let alert = session.take_alert(AlertSlot::CmsSocialLinksPage).await;
            Ok(listing_page(
                "cms/social-links",
                "Social links",
                "social_links",
                &page,
                &links,
                alert,
                &user,
            )
            .into_response())
        }
    }
}

/// `GET /cms/social-links/add`
pub async fn add_form(Extension(user): Extension<SessionUser>) -> Response {
    form_page(
        "Add social link",
        &user,
        &SocialLinkDraft::default(),
        FormState::default(),
    )
    .into_response()
}

/// `POST /cms/social-links/add`
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
    let draft = draft_from(fields);
    match state.repository.create_social_link(draft.clone()).await {
        Ok(link) => {
            info!(link = %link.link, "Social link created");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsSocialLinksPage,
                Alert::success(format!("Social link {} was successfully created.", link.link)),
                SOCIAL_LINKS,
            )
            .await)
        }
        Err(WriteError::Validation(errors)) => {
            warn!("Failure creating social link: {errors}");
            Ok(invalid_form("Add social link", &user, &draft, FormState::with_errors(errors)))
        }
        Err(WriteError::Store(err)) => {
            error!("Failure creating social link: {err}");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsSocialLinksPage,
                Alert::danger("Social link could not be created."),
                SOCIAL_LINKS,
            )
            .await)
        }
    }
}

/// `GET /cms/social-links/update/{id}`
pub async fn update_form<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(user): Extension<SessionUser>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let id = parse_identity(&raw_id, SOCIAL_LINKS)?;
    let link = state
        .repository
        .get_social_link(id)
        .await
        .or_redirect(SOCIAL_LINKS)?;
    let draft = SocialLinkDraft {
        paraphrase: link.paraphrase,
        link: link.link,
        icon_class: link.icon_class,
    };
    Ok(form_page("Update social link", &user, &draft, FormState::default()).into_response())
}

/// `POST /cms/social-links/update/{id}`
#[instrument(skip_all)]
pub async fn update<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
    Path(raw_id): Path<String>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let id = parse_identity(&raw_id, SOCIAL_LINKS)?;
    let draft = draft_from(fields);
    match state.repository.update_social_link(id, draft.clone()).await {
        Ok(link) => {
            info!(link = %link.link, "Social link updated");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsSocialLinksPage,
                Alert::success(format!("Social link {} was successfully updated.", link.link)),
                SOCIAL_LINKS,
            )
            .await)
        }
        Err(WriteError::Validation(errors)) => {
            warn!("Failure updating social link: {errors}");
            Ok(invalid_form(
                "Update social link",
                &user,
                &draft,
                FormState::with_errors(errors),
            ))
        }
        Err(WriteError::Store(StoreError::NotFound)) => {
            Ok(Redirect::to(SOCIAL_LINKS).into_response())
        }
        Err(WriteError::Store(err)) => {
            error!("Failure updating social link: {err}");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsSocialLinksPage,
                Alert::danger("Social link could not be updated."),
                SOCIAL_LINKS,
            )
            .await)
        }
    }
}

/// `GET /cms/social-links/delete/{id}`
#[instrument(skip_all)]
pub async fn delete<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let id = parse_identity(&raw_id, SOCIAL_LINKS)?;
    let alert = match state.repository.delete_social_link(id).await {
        Ok(link) => {
            info!(link = %link.link, "Social link removed");
            Alert::success(format!("Social link {} was successfully removed.", link.link))
        }
        Err(StoreError::NotFound) => return Ok(Redirect::to(SOCIAL_LINKS).into_response()),
        Err(err) => {
            error!("Failure removing social link: {err}");
            Alert::danger("Social link could not be removed.")
        }
    };
    Ok(redirect_with_alert(&session, AlertSlot::CmsSocialLinksPage, alert, SOCIAL_LINKS).await)
}

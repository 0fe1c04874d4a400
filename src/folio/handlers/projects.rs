//! Project listing and the add/update/delete flows.
//!
//! The add and update forms offer the roster of GitHub repositories that are
//! not imported yet. When GitHub cannot be reached the forms still render,
//! with no candidates and a danger alert.

use super::{
    listing_page, paginate, redirect_with_alert, FormFields, FormState, Listing, PROJECTS,
};
use crate::folio::{
    alerts::{Alert, AlertSlot},
    error::{parse_identity, AppError, StoreResultExt},
    pagination::{PageQuery, PageRequest},
    render::Page,
    roster::{self, RepositorySource, RosterEntry, RosterError},
    session::{Session, SessionUser},
    storage::{Project, ProjectDraft, Repository, StoreError, WriteError},
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

const GITHUB_UNAVAILABLE: &str = "GitHub repositories could not be loaded. Try again later.";
const UNKNOWN_REPOSITORY: &str = "Selected GitHub project does not exist.";

/// Submitted or persisted values of the project form.
#[derive(Debug, Clone, Default, Serialize)]
struct ProjectForm {
    github_project: String,
    alternative_name: String,
    description: String,
    tech_stack: Vec<String>,
}

impl ProjectForm {
    fn blank() -> Self {
        Self {
            tech_stack: vec![String::new()],
            ..Self::default()
        }
    }

    fn from_fields(fields: &FormFields) -> Self {
        Self {
            github_project: fields.value("github_project"),
            alternative_name: fields.value("alternative_name"),
            description: fields.value("description"),
            tech_stack: fields.values("tech_stack"),
        }
    }

    fn from_project(project: &Project) -> Self {
        Self {
            github_project: project.name.clone(),
            alternative_name: project.alternative_name.clone(),
            description: project.description.clone(),
            tech_stack: project
                .tech_stack
                .iter()
                .map(|position| position.name.clone())
                .collect(),
        }
    }

    fn draft(&self, external_id: i64) -> ProjectDraft {
        ProjectDraft::new(
            external_id,
            &self.github_project,
            &self.alternative_name,
            &self.description,
            &self.tech_stack,
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum FormAction {
    Add,
    Update,
}

impl FormAction {
    const fn title(self) -> &'static str {
        match self {
            Self::Add => "Add project",
            Self::Update => "Update project",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Update => "Update",
        }
    }
}

fn form_page(
    action: FormAction,
    user: &SessionUser,
    form: &ProjectForm,
    current: Option<&str>,
    candidates: &[RosterEntry],
    state: FormState,
) -> Page {
    Page::new("cms/project-form", action.title())
        .with("user", user)
        .with("action", action.label())
        .with("form", form)
        .with("current", current)
        .with("projects", candidates)
        .with("errors", state.errors)
        .with("alert", state.alert)
}

/// Roster for the forms. A GitHub failure degrades to no candidates and an alert.
async fn load_candidates<R, G>(
    state: &AppState<R, G>,
    exclude: Option<&str>,
) -> Result<(Vec<RosterEntry>, Option<Alert>), AppError>
where
    R: Repository,
    G: RepositorySource,
{
    match roster::reconcile(&state.github, &state.repository, exclude).await {
        Ok(candidates) => Ok((candidates, None)),
        Err(RosterError::External(err)) => {
            error!("Failed to load GitHub repositories: {err}");
            Ok((Vec::new(), Some(Alert::danger(GITHUB_UNAVAILABLE))))
        }
        Err(RosterError::Store(err)) => Err(err.into()),
    }
}

fn update_url(id: uuid::Uuid) -> String {
    format!("{PROJECTS}/update/{id}")
}

/// `GET /cms/projects`
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
        PROJECTS,
        &request,
        |filter| async move { repository.count_projects(&filter).await },
        |filter, offset, limit| async move {
            repository.find_projects(&filter, offset, limit).await
        },
    )
    .await?;

    match listing {
        Listing::Redirect(url) => Ok(Redirect::to(&url).into_response()),
        Listing::Render(page, projects) => {
            let alert = session.take_alert(AlertSlot::CmsProjectsPage).await;
            Ok(listing_page(
                "cms/projects",
                "Projects",
                "projects",
                &page,
                &projects,
                alert,
                &user,
            )
            .into_response())
        }
    }
}

/// `GET /cms/projects/add`
pub async fn add_form<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let (candidates, alert) = load_candidates(&state, None).await?;
    Ok(form_page(
        FormAction::Add,
        &user,
        &ProjectForm::blank(),
        None,
        &candidates,
        FormState::with_alert(alert),
    )
    .into_response())
}

/// `POST /cms/projects/add`
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
    let form = ProjectForm::from_fields(&FormFields::new(fields));

    let mut errors = ValidationErrors::new();
    let external_id = if form.github_project.is_empty() {
        0
    } else {
        match state.github.repository_id(&form.github_project).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                errors.add(FieldPath::field("github_project"), UNKNOWN_REPOSITORY);
                0
            }
            Err(err) => {
                error!("Failed to resolve GitHub repository {}: {err}", form.github_project);
                let page = form_page(
                    FormAction::Add,
                    &user,
                    &form,
                    None,
                    &[],
                    FormState::with_alert(Some(Alert::danger(GITHUB_UNAVAILABLE))),
                );
                return Ok(page.into_response());
            }
        }
    };

    let draft = form.draft(external_id);
    if let Err(draft_errors) = draft.validate() {
        errors.merge(draft_errors);
    }
    let result = if errors.is_empty() {
        state.repository.create_project(draft).await
    } else {
        Err(WriteError::Validation(errors))
    };

    match result {
        Ok(project) => {
            info!(project = %project.name, id = %project.id, "Project created");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsProjectsPage,
                Alert::success(format!("Project {} was successfully created.", project.name)),
                PROJECTS,
            )
            .await)
        }
        Err(WriteError::Validation(errors)) => {
            warn!("Failure creating project: {errors}");
            let (candidates, alert) = load_candidates(&state, None).await?;
            let page = form_page(
                FormAction::Add,
                &user,
                &form,
                None,
                &candidates,
                FormState { errors, alert },
            );
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(WriteError::Store(err)) => {
            error!("Failure creating project: {err}");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsProjectsPage,
                Alert::danger("Project could not be created."),
                PROJECTS,
            )
            .await)
        }
    }
}

/// `GET /cms/projects/update/{id}`
pub async fn update_form<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let id = parse_identity(&raw_id, PROJECTS)?;
    let project = state.repository.get_project(id).await.or_redirect(PROJECTS)?;

    let (candidates, degraded) = load_candidates(&state, Some(&project.name)).await?;
    let pending = session.take_alert(AlertSlot::CmsProjectUpdatePage).await;

    Ok(form_page(
        FormAction::Update,
        &user,
        &ProjectForm::from_project(&project),
        Some(&project.name),
        &candidates,
        FormState::with_alert(degraded.or(pending)),
    )
    .into_response())
}

/// `POST /cms/projects/update/{id}`
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
    let id = parse_identity(&raw_id, PROJECTS)?;
    let project = state.repository.get_project(id).await.or_redirect(PROJECTS)?;
    let form = ProjectForm::from_fields(&FormFields::new(fields));

    let candidates =
        match roster::reconcile(&state.github, &state.repository, Some(&project.name)).await {
            Ok(candidates) => candidates,
            Err(RosterError::External(err)) => {
                error!("Failed to load GitHub repositories: {err}");
                return Ok(redirect_with_alert(
                    &session,
                    AlertSlot::CmsProjectUpdatePage,
                    Alert::danger(GITHUB_UNAVAILABLE),
                    &update_url(id),
                )
                .await);
            }
            Err(RosterError::Store(err)) => return Err(err.into()),
        };

    let mut errors = ValidationErrors::new();
    let external_id = if form.github_project == project.name {
        project.external_id
    } else if let Some(entry) = candidates
        .iter()
        .find(|entry| entry.name == form.github_project)
    {
        entry.external_id
    } else {
        if !form.github_project.is_empty() {
            errors.add(FieldPath::field("github_project"), UNKNOWN_REPOSITORY);
        }
        0
    };

    let draft = form.draft(external_id);
    if let Err(draft_errors) = draft.validate() {
        errors.merge(draft_errors);
    }
    let result = if errors.is_empty() {
        state.repository.update_project(id, draft).await
    } else {
        Err(WriteError::Validation(errors))
    };

    match result {
        Ok(updated) => {
            info!(project = %updated.name, "Project updated");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsProjectsPage,
                Alert::success(format!("Project {} was successfully updated.", updated.name)),
                PROJECTS,
            )
            .await)
        }
        Err(WriteError::Validation(errors)) => {
            warn!("Failure updating project: {errors}");
            let page = form_page(
                FormAction::Update,
                &user,
                &form,
                Some(&project.name),
                &candidates,
                FormState::with_errors(errors),
            );
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(WriteError::Store(StoreError::NotFound)) => Ok(Redirect::to(PROJECTS).into_response()),
        Err(WriteError::Store(err)) => {
            error!("Failure updating project: {err}");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsProjectsPage,
                Alert::danger("Project could not be updated."),
                PROJECTS,
            )
            .await)
        }
    }
}

/// `GET /cms/projects/delete/{id}`
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
    let id = parse_identity(&raw_id, PROJECTS)?;
    let alert = match state.repository.delete_project(id).await {
        Ok(project) => {
            info!(project = %project.name, "Project removed");
            Alert::success(format!("Project {} was successfully removed.", project.name))
        }
        Err(StoreError::NotFound) => return Ok(Redirect::to(PROJECTS).into_response()),
        Err(err) => {
            error!("Failure removing project: {err}");
            Alert::danger("Project could not be removed.")
        }
    };
    Ok(redirect_with_alert(&session, AlertSlot::CmsProjectsPage, alert, PROJECTS).await)
}

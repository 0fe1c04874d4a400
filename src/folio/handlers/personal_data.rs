use super::{redirect_with_alert, FormFields, FormState, PERSONAL_DATA};
use crate::folio::{
    alerts::{Alert, AlertSlot},
    error::AppError,
    render::Page,
    roster::RepositorySource,
    session::{Session, SessionUser},
    storage::{PersonalData, Repository, WriteError},
    AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form,
};
use tracing::{error, info, instrument, warn};

fn personal_data_page(user: &SessionUser, data: &PersonalData, state: FormState) -> Page {
    Page::new("cms/personal-data", "Personal data")
        .with("user", user)
        .with("form", data)
        .with("errors", state.errors)
        .with("alert", state.alert)
}

/// `GET /cms/personal-data`
pub async fn edit_form<R, G>(
    State(state): State<AppState<R, G>>,
    Extension(session): Extension<Session>,
    Extension(user): Extension<SessionUser>,
) -> Result<Response, AppError>
where
    R: Repository,
    G: RepositorySource,
{
    let data = state.repository.personal_data().await?.unwrap_or_default();
    let alert = session.take_alert(AlertSlot::CmsPersonalDataPage).await;
    Ok(personal_data_page(&user, &data, FormState::with_alert(alert)).into_response())
}

/// `POST /cms/personal-data`
#[instrument(skip_all)]
pub async fn save<R, G>(
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
    let data = PersonalData {
        description_top: fields.value("description_top"),
        description_bottom: fields.value("description_bottom"),
        maven_central_link: fields.value("maven_central_link"),
        github_account_link: fields.value("github_account_link"),
        first_email: fields.value("first_email"),
        second_email: fields.value("second_email"),
        github_name: fields.value("github_name"),
    };

    let result = match data.validate() {
        Ok(()) => state.repository.save_personal_data(data.clone()).await,
        Err(errors) => Err(WriteError::Validation(errors)),
    };

    match result {
        Ok(_) => {
            info!(login = %user.login, "Personal data updated");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsPersonalDataPage,
                Alert::success("Personal data was successfully updated."),
                PERSONAL_DATA,
            )
            .await)
        }
        Err(WriteError::Validation(errors)) => {
            warn!("Failure updating personal data: {errors}");
            let page = personal_data_page(&user, &data, FormState::with_errors(errors));
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(WriteError::Store(err)) => {
            error!("Failure updating personal data: {err}");
            Ok(redirect_with_alert(
                &session,
                AlertSlot::CmsPersonalDataPage,
                Alert::danger("Personal data could not be updated."),
                PERSONAL_DATA,
            )
            .await)
        }
    }
}

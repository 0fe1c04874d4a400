pub mod accounts;
pub mod auth;
pub mod guard;
pub mod health;
pub mod personal_data;
pub mod projects;
pub mod social_links;

// common functions for the handlers
use crate::folio::{
    alerts::{Alert, AlertSlot},
    pagination::{self, PageRequest, PageState, Pagination, PAGE_SIZES},
    render::Page,
    session::{Session, SessionUser},
    storage::StoreError,
    validation::ValidationErrors,
};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use std::future::Future;

pub const LOGIN: &str = "/cms/login";
pub const FIRST_LOGIN: &str = "/cms/first-login";
pub const REQUEST_CHANGE_PASSWORD: &str = "/cms/request-change-password";
pub const PROJECTS: &str = "/cms/projects";
pub const ACCOUNTS: &str = "/cms/accounts";
pub const PERSONAL_DATA: &str = "/cms/personal-data";
pub const SOCIAL_LINKS: &str = "/cms/social-links";

/// Urlencoded form kept as ordered pairs so repeated keys survive.
#[derive(Debug, Clone, Default)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    #[must_use]
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// First value of `key`, trimmed; empty when absent.
    #[must_use]
    pub fn value(&self, key: &str) -> String {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default()
    }

    /// First value of `key` as submitted. Used for secrets.
    #[must_use]
    pub fn raw(&self, key: &str) -> String {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }

    /// Every value of `key` in submitted order, untrimmed.
    #[must_use]
    pub fn values(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .collect()
    }
}

/// Data every form page carries besides its own values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormState {
    pub errors: ValidationErrors,
    pub alert: Option<Alert>,
}

impl FormState {
    #[must_use]
    pub fn with_errors(errors: ValidationErrors) -> Self {
        Self {
            errors,
            alert: None,
        }
    }

    #[must_use]
    pub fn with_alert(alert: Option<Alert>) -> Self {
        Self {
            errors: ValidationErrors::new(),
            alert,
        }
    }
}

/// One page of a listing, or the canonical URL to go to instead.
#[derive(Debug)]
pub enum Listing<T> {
    Render(PageState, Vec<T>),
    Redirect(String),
}

/// Count, normalize, then load one page of a listing.
///
/// # Errors
/// Propagates store failures of either query.
pub async fn paginate<T, C, CF, F, FF>(
    base_path: &str,
    request: &PageRequest,
    count: C,
    find: F,
) -> Result<Listing<T>, StoreError>
where
    C: FnOnce(String) -> CF,
    CF: Future<Output = Result<u64, StoreError>>,
    F: FnOnce(String, u64, u32) -> FF,
    FF: Future<Output = Result<Vec<T>, StoreError>>,
{
    let total = count(request.query.clone()).await?;
    match pagination::normalize(base_path, request, total) {
        Pagination::Redirect(url) => Ok(Listing::Redirect(url)),
        Pagination::Render(page) => {
            let items = find(page.filter().to_string(), page.offset(), page.limit()).await?;
            Ok(Listing::Render(page, items))
        }
    }
}

/// Page of a listing with its rows under `key`.
pub fn listing_page<T: Serialize>(
    template: &'static str,
    title: &str,
    key: &str,
    page: &PageState,
    items: &[T],
    alert: Option<Alert>,
    user: &SessionUser,
) -> Page {
    Page::new(template, title)
        .with("user", user)
        .with("alert", alert)
        .with(key, items)
        .with("pagination", page)
        .with("page_sizes", PAGE_SIZES)
}

/// Store a mutation outcome for the next render of `slot` and go to `target`.
pub async fn redirect_with_alert(
    session: &Session,
    slot: AlertSlot,
    alert: Alert,
    target: &str,
) -> Response {
    session.write_alert(slot, alert).await;
    Redirect::to(target).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_keep_repeated_keys_in_order() {
        let fields = FormFields::new(vec![
            ("tech_stack".to_string(), "Go".to_string()),
            ("name".to_string(), "  folio ".to_string()),
            ("tech_stack".to_string(), "Rust".to_string()),
        ]);
        assert_eq!(fields.values("tech_stack"), ["Go", "Rust"]);
        assert_eq!(fields.value("name"), "folio");
        assert_eq!(fields.raw("name"), "  folio ");
        assert_eq!(fields.value("missing"), "");
        assert!(fields.values("missing").is_empty());
    }
}

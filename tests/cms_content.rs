//! Accounts, personal data and social links through the full router.

mod common;

use axum::http::StatusCode;
use common::{location, payload, FakeGithub, TestApp};
use folio::folio::storage::Role;

async fn admin_app() -> (TestApp, String) {
    let app = TestApp::new(FakeGithub::default());
    app.repository
        .insert_account(&app.hasher, "admin", Role::Admin, false);
    let cookie = app.login("admin").await;
    (app, cookie)
}

#[tokio::test]
async fn admin_creates_account_with_first_login_flag() {
    let (app, cookie) = admin_app().await;

    let response = app
        .post(
            "/cms/accounts/add",
            Some(&cookie),
            &[
                ("login", "editor"),
                ("email", "editor@example.com"),
                ("role", "moderator"),
                ("password", "Editor#123"),
                ("repeated_password", "Editor#123"),
            ],
        )
        .await;
    assert_eq!(location(&response).as_deref(), Some("/cms/accounts"));

    let account = app.repository.account("editor");
    assert_eq!(account.as_ref().map(|a| a.role), Some(Role::Moderator));
    assert_eq!(account.map(|a| a.is_first_login), Some(true));
}

#[tokio::test]
async fn duplicate_login_is_a_field_error() {
    let (app, cookie) = admin_app().await;

    let response = app
        .post(
            "/cms/accounts/add",
            Some(&cookie),
            &[
                ("login", "admin"),
                ("email", "another@example.com"),
                ("role", "admin"),
                ("password", "Another#123"),
                ("repeated_password", "Another#123"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = payload(response).await;
    assert_eq!(payload["data"]["errors"][0]["field"], "login");
}

#[tokio::test]
async fn personal_data_is_validated_and_saved() {
    let (app, cookie) = admin_app().await;

    let response = app
        .post(
            "/cms/personal-data",
            Some(&cookie),
            &[("description_top", "short"), ("first_email", "nope")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let form = [
        ("description_top", "Backend developer writing Rust"),
        ("description_bottom", "Open source maintainer and speaker"),
        ("maven_central_link", "https://central.sonatype.com/namespace/dev.folio"),
        ("github_account_link", "https://github.com/octocat"),
        ("first_email", "me@example.com"),
        ("second_email", "other@example.com"),
        ("github_name", "octocat"),
    ];
    let response = app.post("/cms/personal-data", Some(&cookie), &form).await;
    assert_eq!(location(&response).as_deref(), Some("/cms/personal-data"));

    let response = app.get("/cms/personal-data", Some(&cookie)).await;
    let payload = payload(response).await;
    assert_eq!(payload["data"]["form"]["github_name"], "octocat");
    assert_eq!(
        payload["data"]["alert"]["message"],
        "Personal data was successfully updated."
    );
}

#[tokio::test]
async fn social_link_lifecycle() {
    let (app, cookie) = admin_app().await;

    let response = app
        .post(
            "/cms/social-links/add",
            Some(&cookie),
            &[
                ("paraphrase", "Follow me on GitHub"),
                ("link", "https://github.com/octocat"),
                ("icon_class", "fa-github"),
            ],
        )
        .await;
    assert_eq!(location(&response).as_deref(), Some("/cms/social-links"));

    let response = app.get("/cms/social-links", Some(&cookie)).await;
    let listing = payload(response).await;
    let id = listing["data"]["social_links"][0]["id"]
        .as_str()
        .map(ToString::to_string)
        .unwrap_or_default();
    assert!(!id.is_empty());

    let response = app
        .post(
            &format!("/cms/social-links/update/{id}"),
            Some(&cookie),
            &[
                ("paraphrase", "Short"),
                ("link", "not a link"),
                ("icon_class", "fa-github"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .get(&format!("/cms/social-links/delete/{id}"), Some(&cookie))
        .await;
    assert_eq!(location(&response).as_deref(), Some("/cms/social-links"));

    let response = app.get("/cms/social-links", Some(&cookie)).await;
    let listing = payload(response).await;
    assert_eq!(
        listing["data"]["alert"]["message"],
        "Social link https://github.com/octocat was successfully removed."
    );
    assert_eq!(listing["data"]["social_links"].as_array().map(Vec::len), Some(0));
}

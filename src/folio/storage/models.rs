//! Persisted entities and the drafts used to write them.
//!
//! Drafts carry the field rules of each entity in `validate`. Stores call it
//! before touching the database, so every write path reports the same
//! field-keyed errors.

use crate::folio::validation::{valid_email, valid_link, valid_login, FieldPath, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, str::FromStr};
use uuid::Uuid;

pub const PROJECT_ALTERNATIVE_NAME_MAX: usize = 50;
pub const PROJECT_DESCRIPTION_MIN: usize = 10;
pub const PROJECT_DESCRIPTION_MAX: usize = 2000;
pub const TECH_STACK_NAME_MAX: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechStackPosition {
    pub pos: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub alternative_name: String,
    pub description: String,
    pub tech_stack: Vec<TechStackPosition>,
}

/// Values of the project form, already resolved against GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
    pub external_id: i64,
    pub name: String,
    pub alternative_name: String,
    pub description: String,
    pub tech_stack: Vec<TechStackPosition>,
}

impl ProjectDraft {
    /// Build a draft; tech stack positions follow the submitted order.
    #[must_use]
    pub fn new(
        external_id: i64,
        name: impl Into<String>,
        alternative_name: impl Into<String>,
        description: impl Into<String>,
        tech_stack: &[String],
    ) -> Self {
        Self {
            external_id,
            name: name.into(),
            alternative_name: alternative_name.into(),
            description: description.into(),
            tech_stack: positions(tech_stack),
        }
    }

    /// # Errors
    /// Returns every violated field rule.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.require(&self.name, FieldPath::field("github_project"), "GitHub project");
        if errors.require(
            &self.alternative_name,
            FieldPath::field("alternative_name"),
            "Alternative name",
        ) {
            errors.length(
                &self.alternative_name,
                1,
                PROJECT_ALTERNATIVE_NAME_MAX,
                FieldPath::field("alternative_name"),
                "Alternative name",
            );
        }
        if errors.require(
            &self.description,
            FieldPath::field("description"),
            "Description",
        ) {
            errors.length(
                &self.description,
                PROJECT_DESCRIPTION_MIN,
                PROJECT_DESCRIPTION_MAX,
                FieldPath::field("description"),
                "Description",
            );
        }

        if self.tech_stack.is_empty() {
            errors.add(
                FieldPath::field("tech_stack"),
                "At least one tech stack position is required.",
            );
        }
        for (index, position) in self.tech_stack.iter().enumerate() {
            let field = FieldPath::field("tech_stack").index(index).then("name");
            if errors.require(&position.name, field.clone(), "Tech stack position") {
                errors.length(
                    &position.name,
                    1,
                    TECH_STACK_NAME_MAX,
                    field,
                    "Tech stack position",
                );
            }
        }

        errors.into_result()
    }
}

/// Number submitted names as contiguous positions.
///
/// A list where every row is blank becomes empty; otherwise rows are kept as
/// submitted so blank rows are reported on their own index.
#[must_use]
pub fn positions(names: &[String]) -> Vec<TechStackPosition> {
    if names.iter().all(|name| name.trim().is_empty()) {
        return Vec::new();
    }
    names
        .iter()
        .enumerate()
        .map(|(pos, name)| TechStackPosition {
            pos: i32::try_from(pos).unwrap_or(i32::MAX),
            name: name.trim().to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub login: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub password_hash: String,
    pub is_first_login: bool,
    #[serde(skip)]
    pub reset_token: Option<String>,
    #[serde(skip)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDraft {
    pub login: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
}

impl AccountDraft {
    /// # Errors
    /// Returns every violated field rule.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if errors.require(&self.login, FieldPath::field("login"), "Login") {
            errors.check(
                valid_login(&self.login),
                FieldPath::field("login"),
                "Login must have 3 to 30 letters, digits, dots, dashes or underscores.",
            );
        }
        if errors.require(&self.email, FieldPath::field("email"), "Email") {
            errors.check(
                valid_email(&self.email),
                FieldPath::field("email"),
                "Email is invalid.",
            );
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonalData {
    pub description_top: String,
    pub description_bottom: String,
    pub maven_central_link: String,
    pub github_account_link: String,
    pub first_email: String,
    pub second_email: String,
    pub github_name: String,
}

impl PersonalData {
    /// # Errors
    /// Returns every violated field rule.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (value, field, label) in [
            (
                &self.description_top,
                "description_top",
                "First description section",
            ),
            (
                &self.description_bottom,
                "description_bottom",
                "Second description section",
            ),
        ] {
            if errors.require(value, FieldPath::field(field), label) {
                errors.length(value, 10, 500, FieldPath::field(field), label);
            }
        }

        for (value, field, label) in [
            (
                &self.maven_central_link,
                "maven_central_link",
                "Maven central link",
            ),
            (
                &self.github_account_link,
                "github_account_link",
                "Github account link",
            ),
        ] {
            if errors.require(value, FieldPath::field(field), label) {
                errors.check(valid_link(value), FieldPath::field(field), "Link is invalid.");
            }
        }

        if errors.require(&self.first_email, FieldPath::field("first_email"), "First email") {
            errors.check(
                valid_email(&self.first_email),
                FieldPath::field("first_email"),
                "Email is invalid.",
            );
        }
        if errors.require(
            &self.second_email,
            FieldPath::field("second_email"),
            "Alternative email",
        ) {
            errors.check(
                valid_email(&self.second_email),
                FieldPath::field("second_email"),
                "Alternative email is invalid.",
            );
        }

        errors.require(&self.github_name, FieldPath::field("github_name"), "Github name");

        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialLink {
    pub id: Uuid,
    pub paraphrase: String,
    pub link: String,
    pub icon_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SocialLinkDraft {
    pub paraphrase: String,
    pub link: String,
    pub icon_class: String,
}

impl SocialLinkDraft {
    /// # Errors
    /// Returns every violated field rule.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if errors.require(
            &self.paraphrase,
            FieldPath::field("paraphrase"),
            "Paraphrase of social link",
        ) {
            errors.length(
                &self.paraphrase,
                10,
                150,
                FieldPath::field("paraphrase"),
                "Social link paraphrase",
            );
        }
        if errors.require(&self.link, FieldPath::field("link"), "Link of social link") {
            errors.check(
                valid_link(&self.link),
                FieldPath::field("link"),
                "Link is invalid.",
            );
        }
        errors.require(
            &self.icon_class,
            FieldPath::field("icon_class"),
            "Icon of social link",
        );
        errors.into_result()
    }
}

/// Error reported when a unique column already holds the submitted value.
#[must_use]
pub fn duplicate(field: &'static str) -> ValidationErrors {
    ValidationErrors::single(
        FieldPath::field(field),
        format!("Followed {field} already exist."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn project(tech_stack: &[&str]) -> ProjectDraft {
        ProjectDraft::new(
            42,
            "folio",
            "Folio",
            "Portfolio content management",
            &names(tech_stack),
        )
    }

    #[test]
    fn positions_follow_submitted_order() {
        let draft = project(&["Go", "Rust"]);
        assert_eq!(
            draft.tech_stack,
            vec![
                TechStackPosition {
                    pos: 0,
                    name: "Go".to_string()
                },
                TechStackPosition {
                    pos: 1,
                    name: "Rust".to_string()
                },
            ]
        );
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn all_blank_rows_mean_empty_stack() {
        let draft = project(&["", "  "]);
        assert!(draft.tech_stack.is_empty());
        let errors = draft.validate().err().unwrap_or_default();
        assert!(errors.get(&FieldPath::field("tech_stack")).is_some());
    }

    #[test]
    fn blank_row_is_reported_on_its_index() {
        let errors = project(&["Go", ""]).validate().err().unwrap_or_default();
        assert_eq!(
            errors.get(&FieldPath::field("tech_stack").index(1).then("name")),
            Some("Tech stack position is required.")
        );
        assert_eq!(
            errors.get(&FieldPath::field("tech_stack").index(0).then("name")),
            None
        );
    }

    #[test]
    fn project_field_bounds() {
        let mut draft = project(&["Rust"]);
        draft.description = "too short".to_string();
        draft.alternative_name = "x".repeat(51);
        let errors = draft.validate().err().unwrap_or_default();
        assert!(errors.get(&FieldPath::field("description")).is_some());
        assert!(errors.get(&FieldPath::field("alternative_name")).is_some());
    }

    #[test]
    fn account_rules() {
        let draft = AccountDraft {
            login: "a b".to_string(),
            email: "nope".to_string(),
            role: Role::Moderator,
            password_hash: String::new(),
        };
        let errors = draft.validate().err().unwrap_or_default();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn personal_data_rules() {
        let data = PersonalData {
            description_top: "A long enough description".to_string(),
            description_bottom: "short".to_string(),
            maven_central_link: "https://central.sonatype.com/namespace/pl.example".to_string(),
            github_account_link: "github".to_string(),
            first_email: "me@example.com".to_string(),
            second_email: "other@example.com".to_string(),
            github_name: String::new(),
        };
        let errors = data.validate().err().unwrap_or_default();
        let fields: Vec<String> = errors.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(
            fields,
            ["description_bottom", "github_account_link", "github_name"]
        );
    }

    #[test]
    fn social_link_rules() {
        let draft = SocialLinkDraft {
            paraphrase: "Follow me on GitHub".to_string(),
            link: "https://github.com/someone".to_string(),
            icon_class: "fa-brands fa-github".to_string(),
        };
        assert!(draft.validate().is_ok());
        assert_eq!(
            duplicate("link").get(&FieldPath::field("link")),
            Some("Followed link already exist.")
        );
    }

    #[test]
    fn role_parses() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }
}

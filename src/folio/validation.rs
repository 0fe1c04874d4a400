//! Field-keyed validation errors.
//!
//! Errors are an ordered list of `{field, message}` pairs. A field is a
//! structured [`FieldPath`] such as `tech_stack.1.name`; lookups compare
//! paths, never formatted strings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(&'static str),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    #[must_use]
    pub fn field(name: &'static str) -> Self {
        Self(vec![PathSegment::Field(name)])
    }

    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    #[must_use]
    pub fn then(mut self, name: &'static str) -> Self {
        self.0.push(PathSegment::Field(name));
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Field(name) => f.write_str(name)?,
                PathSegment::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: FieldPath,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(field: FieldPath, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record an error unless `field` already has one.
    pub fn add(&mut self, field: FieldPath, message: impl Into<String>) {
        if self.get(&field).is_none() {
            self.0.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    /// Record `message` on `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: FieldPath, message: impl Into<String>) {
        if !ok {
            self.add(field, message);
        }
    }

    /// Record a "required" error when `value` is blank. Returns whether it was present.
    pub fn require(&mut self, value: &str, field: FieldPath, label: &str) -> bool {
        let present = !value.trim().is_empty();
        self.check(present, field, format!("{label} is required."));
        present
    }

    /// Length bounds in characters, inclusive.
    pub fn length(
        &mut self,
        value: &str,
        min: usize,
        max: usize,
        field: FieldPath,
        label: &str,
    ) {
        let length = value.chars().count();
        if length < min {
            self.add(
                field,
                format!("{label} must have at least {min} characters."),
            );
        } else if length > max {
            self.add(
                field,
                format!("{label} must have at most {max} characters."),
            );
        }
    }

    #[must_use]
    pub fn get(&self, field: &FieldPath) -> Option<&str> {
        self.0
            .iter()
            .find(|error| &error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn merge(&mut self, other: Self) {
        for error in other.0 {
            self.add(error.field, error.message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    /// Returns `self` when at least one error was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
static LINK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*\.[^\s]+$").ok());
static LOGIN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,30}$").ok());

fn is_match(regex: &Option<Regex>, value: &str) -> bool {
    regex.as_ref().is_some_and(|regex| regex.is_match(value))
}

pub fn valid_email(email: &str) -> bool {
    is_match(&EMAIL, email)
}

pub fn valid_link(link: &str) -> bool {
    is_match(&LINK, link)
}

pub fn valid_login(login: &str) -> bool {
    is_match(&LOGIN, login)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_path_formats_with_dots() {
        let path = FieldPath::field("tech_stack").index(1).then("name");
        assert_eq!(path.to_string(), "tech_stack.1.name");
    }

    #[test]
    fn lookup_is_by_structured_path() {
        let mut errors = ValidationErrors::new();
        errors.add(FieldPath::field("tech_stack").index(1).then("name"), "bad");

        assert_eq!(
            errors.get(&FieldPath::field("tech_stack").index(1).then("name")),
            Some("bad")
        );
        assert_eq!(errors.get(&FieldPath::field("tech_stack").index(1)), None);
        assert_eq!(errors.get(&FieldPath::field("tech_stack")), None);
    }

    #[test]
    fn first_error_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add(FieldPath::field("name"), "first");
        errors.add(FieldPath::field("name"), "second");
        errors.add(FieldPath::field("email"), "other");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get(&FieldPath::field("name")), Some("first"));
        let fields: Vec<String> = errors.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(fields, ["name", "email"]);
    }

    #[test]
    fn require_and_length() {
        let mut errors = ValidationErrors::new();
        assert!(!errors.require("  ", FieldPath::field("name"), "Name"));
        errors.length("short", 10, 20, FieldPath::field("description"), "Description");
        errors.length("ok", 1, 2, FieldPath::field("alt"), "Alt");

        assert_eq!(
            errors.get(&FieldPath::field("name")),
            Some("Name is required.")
        );
        assert_eq!(
            errors.get(&FieldPath::field("description")),
            Some("Description must have at least 10 characters.")
        );
        assert_eq!(errors.get(&FieldPath::field("alt")), None);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn serializes_as_flat_list() {
        let errors = ValidationErrors::single(FieldPath::field("tech_stack").index(0), "x");
        let json = serde_json::to_string(&errors).unwrap_or_default();
        assert_eq!(json, r#"[{"field":"tech_stack.0","message":"x"}]"#);
    }

    #[test]
    fn patterns() {
        assert!(valid_email("me@example.com"));
        assert!(!valid_email("me@example"));
        assert!(valid_link("https://github.com/someone"));
        assert!(valid_link("http://example.org"));
        assert!(!valid_link("ftp://example.org"));
        assert!(!valid_link("https://nodot"));
        assert!(valid_login("ad.min_1"));
        assert!(!valid_login("ad"));
        assert!(!valid_login("bad login"));
    }
}

//! # Folio (portfolio content management)
//!
//! `folio` is the administration backend of a personal portfolio website. An
//! authenticated administrator manages projects, personal biography data,
//! social links and CMS accounts through server-rendered HTML forms.
//!
//! ## Projects and the GitHub roster
//!
//! Projects mirror GitHub repositories. The add/update forms only offer
//! repositories that are not imported yet (the *roster*), computed by
//! reconciling the live GitHub listing against persisted project names.
//!
//! ## Listing pages
//!
//! Every listing accepts `q` (case-insensitive filter), `page` and `total`
//! (page size). Invalid or out-of-range combinations are answered with a
//! redirect to the canonical URL, which always renders without redirecting.
//!
//! ## Sessions and alerts
//!
//! Sessions live server-side and hold the logged user plus one pending alert
//! per page family. An alert written by a mutation is shown by the next
//! render of that page family and then dropped.
//!
//! ## Credentials
//!
//! Passwords are hashed with Argon2id and a fresh salt per hash. Password
//! changes go through a policy check (complexity, not unchanged, repeated
//! exactly) before the new hash is persisted.

pub mod cli;
pub mod folio;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

//! In-memory stores and helpers shared by the router tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use folio::folio::{
    credentials::CredentialHasher,
    render::page_payload,
    roster::{ExternalServiceError, RepositorySource, RosterEntry},
    router,
    session::SessionStore,
    storage::{
        models::duplicate, Account, AccountDraft, AccountStore, PersonalData, PersonalDataStore,
        Project, ProjectDraft, ProjectStore, Repository, Role, SocialLink, SocialLinkDraft,
        SocialLinkStore, StoreError, WriteError,
    },
    AppState, CmsConfig,
};
use secrecy::SecretString;
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Initial#123";

#[derive(Debug, Default)]
struct Tables {
    projects: Vec<Project>,
    accounts: Vec<Account>,
    personal_data: Option<PersonalData>,
    social_links: Vec<SocialLink>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

fn matches(filter: &str, values: &[&str]) -> bool {
    let filter = filter.to_lowercase();
    values
        .iter()
        .any(|value| value.to_lowercase().contains(&filter))
}

fn window<T: Clone>(rows: Vec<T>, offset: u64, limit: u32) -> Vec<T> {
    rows.into_iter()
        .skip(usize::try_from(offset).unwrap())
        .take(limit as usize)
        .collect()
}

impl MemoryRepository {
    pub fn projects(&self) -> Vec<Project> {
        self.tables.lock().unwrap().projects.clone()
    }

    pub fn account(&self, login: &str) -> Option<Account> {
        self.tables
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|account| account.login == login)
            .cloned()
    }

    pub fn insert_project(&self, external_id: i64, name: &str, tech_stack: &[&str]) -> Project {
        let names: Vec<String> = tech_stack.iter().map(ToString::to_string).collect();
        let draft = ProjectDraft::new(
            external_id,
            name,
            name,
            "A project imported for tests",
            &names,
        );
        let project = Project {
            id: Uuid::new_v4(),
            external_id: draft.external_id,
            name: draft.name,
            alternative_name: draft.alternative_name,
            description: draft.description,
            tech_stack: draft.tech_stack,
        };
        self.tables.lock().unwrap().projects.push(project.clone());
        project
    }

    pub fn insert_account(&self, hasher: &CredentialHasher, login: &str, role: Role, first: bool) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            login: login.to_string(),
            email: format!("{login}@example.com"),
            role,
            password_hash: hasher.hash(PASSWORD).unwrap(),
            is_first_login: first,
            reset_token: None,
            reset_token_expires_at: None,
        };
        self.tables.lock().unwrap().accounts.push(account.clone());
        account
    }
}

impl ProjectStore for MemoryRepository {
    async fn count_projects(&self, filter: &str) -> Result<u64, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .projects
            .iter()
            .filter(|p| matches(filter, &[&p.name, &p.alternative_name]))
            .count() as u64)
    }

    async fn find_projects(
        &self,
        filter: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let rows = tables
            .projects
            .iter()
            .filter(|p| matches(filter, &[&p.name, &p.alternative_name]))
            .cloned()
            .collect();
        Ok(window(rows, offset, limit))
    }

    async fn project_names(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.projects.iter().map(|p| p.name.clone()).collect())
    }

    async fn get_project(&self, id: Uuid) -> Result<Project, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_project(&self, draft: ProjectDraft) -> Result<Project, WriteError> {
        draft.validate()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.projects.iter().any(|p| p.name == draft.name) {
            return Err(duplicate("github_project").into());
        }
        let project = Project {
            id: Uuid::new_v4(),
            external_id: draft.external_id,
            name: draft.name,
            alternative_name: draft.alternative_name,
            description: draft.description,
            tech_stack: draft.tech_stack,
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: Uuid, draft: ProjectDraft) -> Result<Project, WriteError> {
        draft.validate()?;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .projects
            .iter()
            .any(|p| p.id != id && p.name == draft.name)
        {
            return Err(duplicate("github_project").into());
        }
        let project = tables
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        project.external_id = draft.external_id;
        project.name = draft.name;
        project.alternative_name = draft.alternative_name;
        project.description = draft.description;
        project.tech_stack = draft.tech_stack;
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> Result<Project, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let index = tables
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        Ok(tables.projects.remove(index))
    }
}

impl AccountStore for MemoryRepository {
    async fn count_accounts(&self, filter: &str) -> Result<u64, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .accounts
            .iter()
            .filter(|a| matches(filter, &[&a.login, &a.email]))
            .count() as u64)
    }

    async fn find_accounts(
        &self,
        filter: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Account>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let rows = tables
            .accounts
            .iter()
            .filter(|a| matches(filter, &[&a.login, &a.email]))
            .cloned()
            .collect();
        Ok(window(rows, offset, limit))
    }

    async fn get_account(&self, id: Uuid) -> Result<Account, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables
            .accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_account_by_identity(&self, identity: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .accounts
            .iter()
            .find(|a| a.login == identity || a.email == identity)
            .cloned())
    }

    async fn find_account_by_reset_token(&self, token: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .accounts
            .iter()
            .find(|a| a.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn create_account(&self, draft: AccountDraft) -> Result<Account, WriteError> {
        draft.validate()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.accounts.iter().any(|a| a.login == draft.login) {
            return Err(duplicate("login").into());
        }
        if tables.accounts.iter().any(|a| a.email == draft.email) {
            return Err(duplicate("email").into());
        }
        let account = Account {
            id: Uuid::new_v4(),
            login: draft.login,
            email: draft.email,
            role: draft.role,
            password_hash: draft.password_hash,
            is_first_login: true,
            reset_token: None,
            reset_token_expires_at: None,
        };
        tables.accounts.push(account.clone());
        Ok(account)
    }

    async fn replace_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        account.password_hash = password_hash.to_string();
        account.is_first_login = false;
        account.reset_token = None;
        account.reset_token_expires_at = None;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        account.reset_token = Some(token.to_string());
        account.reset_token_expires_at = Some(expires_at);
        Ok(())
    }

    async fn delete_account(&self, id: Uuid) -> Result<Account, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let index = tables
            .accounts
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        Ok(tables.accounts.remove(index))
    }
}

impl PersonalDataStore for MemoryRepository {
    async fn personal_data(&self) -> Result<Option<PersonalData>, StoreError> {
        Ok(self.tables.lock().unwrap().personal_data.clone())
    }

    async fn save_personal_data(&self, data: PersonalData) -> Result<PersonalData, WriteError> {
        data.validate()?;
        self.tables.lock().unwrap().personal_data = Some(data.clone());
        Ok(data)
    }
}

impl SocialLinkStore for MemoryRepository {
    async fn count_social_links(&self, filter: &str) -> Result<u64, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .social_links
            .iter()
            .filter(|l| matches(filter, &[&l.paraphrase, &l.link]))
            .count() as u64)
    }

    async fn find_social_links(
        &self,
        filter: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<SocialLink>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let rows = tables
            .social_links
            .iter()
            .filter(|l| matches(filter, &[&l.paraphrase, &l.link]))
            .cloned()
            .collect();
        Ok(window(rows, offset, limit))
    }

    async fn get_social_link(&self, id: Uuid) -> Result<SocialLink, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables
            .social_links
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_social_link(&self, draft: SocialLinkDraft) -> Result<SocialLink, WriteError> {
        draft.validate()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.social_links.iter().any(|l| l.link == draft.link) {
            return Err(duplicate("link").into());
        }
        let link = SocialLink {
            id: Uuid::new_v4(),
            paraphrase: draft.paraphrase,
            link: draft.link,
            icon_class: draft.icon_class,
        };
        tables.social_links.push(link.clone());
        Ok(link)
    }

    async fn update_social_link(
        &self,
        id: Uuid,
        draft: SocialLinkDraft,
    ) -> Result<SocialLink, WriteError> {
        draft.validate()?;
        let mut tables = self.tables.lock().unwrap();
        let link = tables
            .social_links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(StoreError::NotFound)?;
        link.paraphrase = draft.paraphrase;
        link.link = draft.link;
        link.icon_class = draft.icon_class;
        Ok(link.clone())
    }

    async fn delete_social_link(&self, id: Uuid) -> Result<SocialLink, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let index = tables
            .social_links
            .iter()
            .position(|l| l.id == id)
            .ok_or(StoreError::NotFound)?;
        Ok(tables.social_links.remove(index))
    }
}

impl Repository for MemoryRepository {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// GitHub listing with a switch to simulate an outage.
#[derive(Debug, Clone, Default)]
pub struct FakeGithub {
    repositories: Arc<Vec<RosterEntry>>,
    down: Arc<AtomicBool>,
}

impl FakeGithub {
    pub fn with_repositories(names: &[(i64, &str)]) -> Self {
        Self {
            repositories: Arc::new(
                names
                    .iter()
                    .map(|(external_id, name)| RosterEntry {
                        external_id: *external_id,
                        name: (*name).to_string(),
                    })
                    .collect(),
            ),
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn outage(&self) -> Result<(), ExternalServiceError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ExternalServiceError::Status {
                url: "https://api.github.com/users/octocat/repos".to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

impl RepositorySource for FakeGithub {
    async fn list_repositories(&self) -> Result<Vec<RosterEntry>, ExternalServiceError> {
        self.outage()?;
        Ok(self.repositories.as_ref().clone())
    }

    async fn repository_id(&self, name: &str) -> Result<Option<i64>, ExternalServiceError> {
        self.outage()?;
        Ok(self
            .repositories
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.external_id))
    }
}

pub struct TestApp {
    pub router: Router,
    pub repository: MemoryRepository,
    pub github: FakeGithub,
    pub hasher: CredentialHasher,
    pub sessions: SessionStore,
}

impl TestApp {
    pub fn new(github: FakeGithub) -> Self {
        let repository = MemoryRepository::default();
        let hasher = CredentialHasher::new(1).unwrap();
        let sessions = SessionStore::new(
            SecretString::from("test-session-secret"),
            Duration::from_secs(3600),
        );
        let state = AppState::new(
            repository.clone(),
            github.clone(),
            hasher.clone(),
            sessions.clone(),
            CmsConfig::new().with_hash_cost(1),
        );
        Self {
            router: router(state),
            repository,
            github,
            hasher,
            sessions,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, form: &[(&str, &str)]) -> Response<Body> {
        let body = form
            .iter()
            .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Log `login` in with [`PASSWORD`] and return the session cookie.
    pub async fn login(&self, login: &str) -> String {
        let response = self
            .post(
                "/cms/login",
                None,
                &[("identity", login), ("password", PASSWORD)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("session cookie")
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `name=value` part of the `Set-Cookie` header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(ToString::to_string)
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// Page data embedded by the HTML shell.
pub async fn payload(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    page_payload(&html).expect("page payload")
}

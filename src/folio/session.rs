//! Server-side sessions.
//!
//! The cookie carries a random token; the store is keyed by
//! `SHA-256(secret || token)` so raw tokens never sit in memory. Each session
//! holds the logged user (if any) and the pending alert slots.
//!
//! Records are created on the first write, so anonymous requests that only
//! read never allocate a session nor receive a cookie. Logging in moves the
//! record under a fresh token.

use crate::folio::alerts::{Alert, AlertSlot, AlertSlots};
use crate::folio::storage::Role;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error};
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "folio_session";
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Expired records are swept at most this often.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Logged user as kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub login: String,
    pub role: Role,
    pub is_first_login: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    pub user: Option<SessionUser>,
    pub alerts: AlertSlots,
}

#[derive(Debug)]
struct SessionEntry {
    record: SessionRecord,
    last_seen: Instant,
}

type SessionKey = Vec<u8>;

#[derive(Debug, Default)]
struct SessionMap {
    entries: HashMap<SessionKey, SessionEntry>,
    purged_at: Option<Instant>,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<SessionMap>>,
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("secret", &"***")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

impl SessionStore {
    #[must_use]
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(SessionMap::default())),
            secret,
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, token: &str) -> SessionKey {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.expose_secret().as_bytes());
        hasher.update(token.as_bytes());
        hasher.finalize().to_vec()
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.duration_since(entry.last_seen) >= self.ttl
    }

    /// Session without a record yet. A record and a token are issued on the
    /// first write.
    #[must_use]
    pub fn anonymous(&self) -> Session {
        Session {
            store: self.clone(),
            state: Arc::new(Mutex::new(HandleState::default())),
        }
    }

    /// Resume the session behind `token`, refreshing its idle timer.
    pub async fn resume(&self, token: &str) -> Option<Session> {
        let key = self.key(token);
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let expired = match sessions.entries.get_mut(&key) {
            Some(entry) if !self.is_expired(entry, now) => {
                entry.last_seen = now;
                false
            }
            Some(_) => true,
            None => return None,
        };
        if expired {
            sessions.entries.remove(&key);
            return None;
        }
        drop(sessions);
        Some(Session {
            store: self.clone(),
            state: Arc::new(Mutex::new(HandleState {
                key: Some(key),
                issued: None,
            })),
        })
    }

    /// Store `record` under a fresh token, dropping the record at `previous`.
    /// Returns the new key and the raw cookie token.
    async fn issue(
        &self,
        previous: Option<&SessionKey>,
        record: impl FnOnce(Option<SessionRecord>) -> SessionRecord,
    ) -> (SessionKey, String) {
        let token = generate_session_token();
        let key = self.key(&token);
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let interval = self.ttl.min(PURGE_INTERVAL);
        if sessions
            .purged_at
            .map_or(true, |purged_at| now.duration_since(purged_at) >= interval)
        {
            let ttl = self.ttl;
            sessions
                .entries
                .retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
            sessions.purged_at = Some(now);
        }

        let carried = previous
            .and_then(|previous| sessions.entries.remove(previous))
            .map(|entry| entry.record);
        sessions.entries.insert(
            key.clone(),
            SessionEntry {
                record: record(carried),
                last_seen: now,
            },
        );
        (key, token)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.entries.is_empty()
    }

    async fn read<T>(&self, key: &[u8], f: impl FnOnce(&SessionRecord) -> T) -> Option<T> {
        self.sessions
            .read()
            .await
            .entries
            .get(key)
            .map(|entry| f(&entry.record))
    }

    async fn update<T>(&self, key: &[u8], f: impl FnOnce(&mut SessionRecord) -> T) -> Option<T> {
        self.sessions
            .write()
            .await
            .entries
            .get_mut(key)
            .map(|entry| f(&mut entry.record))
    }

    async fn remove(&self, key: &[u8]) {
        self.sessions.write().await.entries.remove(key);
    }
}

#[derive(Debug, Default)]
struct HandleState {
    key: Option<SessionKey>,
    /// Token issued during this request, to be sent as a cookie.
    issued: Option<String>,
}

/// Handle to the session of the current request.
#[derive(Clone)]
pub struct Session {
    store: SessionStore,
    state: Arc<Mutex<HandleState>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    async fn key(&self) -> Option<SessionKey> {
        self.state.lock().await.key.clone()
    }

    /// Token issued while handling the request, if any.
    pub async fn issued_token(&self) -> Option<String> {
        self.state.lock().await.issued.clone()
    }

    pub async fn user(&self) -> Option<SessionUser> {
        let key = self.key().await?;
        self.store
            .read(&key, |record| record.user.clone())
            .await
            .flatten()
    }

    /// Log `user` in under a new token. Pending alerts move along; the
    /// previous token stops resolving.
    pub async fn set_user(&self, user: SessionUser) {
        let mut state = self.state.lock().await;
        let (key, token) = self
            .store
            .issue(state.key.as_ref(), |carried| SessionRecord {
                user: Some(user),
                ..carried.unwrap_or_default()
            })
            .await;
        state.key = Some(key);
        state.issued = Some(token);
    }

    pub async fn complete_first_login(&self) {
        let Some(key) = self.key().await else {
            return;
        };
        self.store
            .update(&key, |record| {
                if let Some(user) = record.user.as_mut() {
                    user.is_first_login = false;
                }
            })
            .await;
    }

    /// Forget the logged user. Pending alerts stay.
    pub async fn clear_user(&self) {
        let Some(key) = self.key().await else {
            return;
        };
        self.store.update(&key, |record| record.user = None).await;
    }

    /// Drop the whole record, alerts included. A later write starts a new
    /// session under a new token.
    pub async fn destroy(&self) {
        let mut state = self.state.lock().await;
        if let Some(key) = state.key.take() {
            self.store.remove(&key).await;
        }
        state.issued = None;
    }

    pub async fn write_alert(&self, slot: AlertSlot, alert: Alert) {
        let mut state = self.state.lock().await;
        if let Some(key) = state.key.as_ref() {
            let written = self
                .store
                .update(key, |record| record.alerts.write(slot, alert.clone()))
                .await;
            if written.is_some() {
                return;
            }
        }
        let (key, token) = self
            .store
            .issue(None, |_| {
                let mut record = SessionRecord::default();
                record.alerts.write(slot, alert);
                record
            })
            .await;
        debug!("created new session");
        state.key = Some(key);
        state.issued = Some(token);
    }

    pub async fn take_alert(&self, slot: AlertSlot) -> Option<Alert> {
        let key = self.key().await?;
        self.store
            .update(&key, |record| record.alerts.read_and_clear(slot))
            .await
            .flatten()
    }
}

/// Read the session token from the `Cookie` header.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[must_use]
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        ttl.as_secs()
    )
}

/// Resolve the session and expose it as a request extension. A token issued
/// by the handler is sent back as a cookie.
pub async fn session_layer(
    State(store): State<SessionStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_session_token(request.headers());
    let resumed = match token {
        Some(token) => store.resume(&token).await,
        None => None,
    };
    let session = resumed.unwrap_or_else(|| store.anonymous());

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if let Some(token) = session.issued_token().await {
        match HeaderValue::from_str(&session_cookie(&token, store.ttl())) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build session cookie: {err}");
                return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl: Duration) -> SessionStore {
        SessionStore::new(SecretString::from("secret"), ttl)
    }

    fn user() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            login: "admin".to_string(),
            role: Role::Admin,
            is_first_login: true,
        }
    }

    async fn logged_in(store: &SessionStore) -> (Session, String) {
        let session = store.anonymous();
        session.set_user(user()).await;
        let token = session.issued_token().await.unwrap_or_default();
        (session, token)
    }

    #[tokio::test]
    async fn reads_do_not_create_records() {
        let store = store(Duration::from_secs(60));
        let session = store.anonymous();

        assert!(session.user().await.is_none());
        assert!(session.take_alert(AlertSlot::LoginPage).await.is_none());
        session.clear_user().await;

        assert!(store.is_empty().await);
        assert!(session.issued_token().await.is_none());
    }

    #[tokio::test]
    async fn resume_finds_logged_session() {
        let store = store(Duration::from_secs(60));
        let (_, token) = logged_in(&store).await;

        let resumed = store.resume(&token).await;
        let login = match resumed {
            Some(session) => session.user().await.map(|u| u.login),
            None => None,
        };
        assert_eq!(login.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn set_user_rotates_token() {
        let store = store(Duration::from_secs(60));
        let session = store.anonymous();
        session
            .write_alert(AlertSlot::LoginPage, Alert::danger("pending"))
            .await;
        let before = session.issued_token().await.unwrap_or_default();

        session.set_user(user()).await;
        let after = session.issued_token().await.unwrap_or_default();

        assert_ne!(before, after);
        assert!(store.resume(&before).await.is_none());
        assert_eq!(store.len().await, 1);

        let resumed = store.resume(&after).await;
        let alert = match resumed {
            Some(session) => session.take_alert(AlertSlot::LoginPage).await,
            None => None,
        };
        assert_eq!(alert, Some(Alert::danger("pending")));
    }

    #[tokio::test]
    async fn unknown_token_is_not_resumed() {
        let store = store(Duration::from_secs(60));
        logged_in(&store).await;
        assert!(store.resume("not-a-token").await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let store = store(Duration::ZERO);
        let (_, token) = logged_in(&store).await;
        assert!(store.resume(&token).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn issuing_purges_expired_sessions() {
        let store = store(Duration::ZERO);
        logged_in(&store).await;
        logged_in(&store).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn alerts_are_read_once() {
        let store = store(Duration::from_secs(60));
        let session = store.anonymous();
        session
            .write_alert(AlertSlot::LoginPage, Alert::success("bye"))
            .await;
        assert!(session.issued_token().await.is_some());

        assert_eq!(
            session.take_alert(AlertSlot::LoginPage).await,
            Some(Alert::success("bye"))
        );
        assert_eq!(session.take_alert(AlertSlot::LoginPage).await, None);
    }

    #[tokio::test]
    async fn clear_user_keeps_alerts() {
        let store = store(Duration::from_secs(60));
        let (session, _) = logged_in(&store).await;
        session
            .write_alert(AlertSlot::LoginPage, Alert::success("bye"))
            .await;
        session.clear_user().await;

        assert!(session.user().await.is_none());
        assert!(session.take_alert(AlertSlot::LoginPage).await.is_some());
    }

    #[tokio::test]
    async fn complete_first_login_clears_flag() {
        let store = store(Duration::from_secs(60));
        let (session, _) = logged_in(&store).await;
        session.complete_first_login().await;
        assert_eq!(session.user().await.map(|u| u.is_first_login), Some(false));
    }

    #[tokio::test]
    async fn destroy_then_write_starts_new_session() {
        let store = store(Duration::from_secs(60));
        let (session, token) = logged_in(&store).await;

        session.destroy().await;
        assert!(store.resume(&token).await.is_none());
        assert!(session.issued_token().await.is_none());

        session
            .write_alert(AlertSlot::LoginPage, Alert::success("bye"))
            .await;
        let fresh = session.issued_token().await.unwrap_or_default();
        assert_ne!(fresh, token);
        assert!(session.user().await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn extracts_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; folio_session=abc123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("folio_session="));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("tok", Duration::from_secs(86400));
        assert_eq!(
            cookie,
            "folio_session=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=86400"
        );
    }

    #[test]
    fn tokens_are_url_safe() {
        let token = generate_session_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}

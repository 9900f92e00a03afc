use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::StoreError;
use crate::state::{AppState, DbPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Danger,
}

impl fmt::Display for FlashCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashCategory::Success => write!(f, "success"),
            FlashCategory::Danger => write!(f, "danger"),
        }
    }
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

/// What is persisted for one client between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub username: Option<String>,
    #[serde(default)]
    pub flashes: Vec<Flash>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.flashes.is_empty()
    }
}

/// Server-side session records, addressed by the token in the cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Unknown and expired tokens both load as `None`.
    async fn load(&self, token: &str) -> Result<Option<SessionData>, StoreError>;

    async fn save(&self, token: &str, data: &SessionData) -> Result<(), StoreError>;

    async fn remove(&self, token: &str) -> Result<(), StoreError>;
}

/// Lifetime of a session that carries only pending flashes.
const ANONYMOUS_SESSION_HOURS: u64 = 1;

pub struct SqliteSessionStore {
    pool: DbPool,
    ttl_hours: u64,
}

impl SqliteSessionStore {
    pub fn new(pool: DbPool, ttl_hours: u64) -> Self {
        Self { pool, ttl_hours }
    }

    fn lifetime_hours(&self, data: &SessionData) -> u64 {
        if data.username.is_some() {
            self.ttl_hours
        } else {
            self.ttl_hours.min(ANONYMOUS_SESSION_HOURS)
        }
    }

    /// Delete expired sessions. Returns the number removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= datetime('now')",
            [],
        )?;
        Ok(rows)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionData>, StoreError> {
        let conn = self.pool.get()?;
        let result: Result<String, rusqlite::Error> = conn.query_row(
            "SELECT data FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, token: &str, data: &SessionData) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let json = serde_json::to_string(data)?;
        conn.execute(
            "INSERT INTO sessions (token, data, expires_at)
             VALUES (?1, ?2, datetime('now', ?3))
             ON CONFLICT(token) DO UPDATE SET
               data = excluded.data,
               expires_at = excluded.expires_at",
            params![token, json, format!("+{} hours", self.lifetime_hours(data))],
        )?;
        Ok(())
    }

    async fn remove(&self, token: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }
}

/// Purges expired rows every `every`, starting immediately.
pub fn spawn_purge_task(store: Arc<SqliteSessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired() {
                Ok(0) => {}
                Ok(purged) => tracing::info!("Purged {} expired sessions", purged),
                Err(e) => tracing::warn!("Failed to purge expired sessions: {}", e),
            }
        }
    })
}

/// Non-expiring in-process session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionData>, StoreError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn save(&self, token: &str, data: &SessionData) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(token.to_string(), data.clone());
        Ok(())
    }

    async fn remove(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

// -- Per-request handle --

struct SessionState {
    data: SessionData,
    changed: bool,
    renew: bool,
}

/// The current client's session for the duration of one request.
/// Installed by [`session_layer`], which writes any changes back.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                data,
                changed: false,
                renew: false,
            })),
        }
    }

    pub async fn username(&self) -> Option<String> {
        self.inner.lock().await.data.username.clone()
    }

    /// Bind the session to `username`. The token is rotated on the way out.
    pub async fn log_in(&self, username: &str) {
        let mut state = self.inner.lock().await;
        state.data.username = Some(username.to_string());
        state.changed = true;
        state.renew = true;
    }

    /// Drop the identity and any pending flashes.
    pub async fn clear(&self) {
        let mut state = self.inner.lock().await;
        state.data = SessionData::default();
        state.changed = true;
        state.renew = true;
    }

    pub async fn flash(&self, category: FlashCategory, message: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.data.flashes.push(Flash {
            category,
            message: message.into(),
        });
        state.changed = true;
    }

    /// Remove and return pending flashes so they render exactly once.
    pub async fn take_flashes(&self) -> Vec<Flash> {
        let mut state = self.inner.lock().await;
        if state.data.flashes.is_empty() {
            return Vec::new();
        }
        state.changed = true;
        std::mem::take(&mut state.data.flashes)
    }
}

// -- Cookie helpers --

fn session_cookie(name: &str, value: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name,
        value,
        max_age_hours * 3600
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn get_cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

// -- Middleware --

/// Resolve the signed session cookie into a [`Session`] request extension,
/// run the handler, then persist whatever the handler changed.
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = get_cookie_value(request.headers(), &state.config.auth.cookie_name)
        .and_then(|value| state.signer.verify(value))
        .map(str::to_string);

    let (token, data) = match token {
        Some(token) => match state.sessions.load(&token).await {
            Ok(Some(data)) => (Some(token), data),
            Ok(None) => (None, SessionData::default()),
            Err(e) => {
                tracing::warn!("Failed to load session: {}", e);
                (None, SessionData::default())
            }
        },
        None => (None, SessionData::default()),
    };

    let session = Session::new(data);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    match persist(&state, token, &session).await {
        Ok(Some(cookie)) => match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid session cookie header: {}", e),
        },
        Ok(None) => {}
        Err(e) => tracing::error!("Failed to save session: {}", e),
    }

    response
}

/// Write the session back. Returns a `Set-Cookie` value when the client's
/// cookie has to change.
async fn persist(
    state: &AppState,
    token: Option<String>,
    session: &Session,
) -> Result<Option<String>, StoreError> {
    let (data, renew) = {
        let inner = session.inner.lock().await;
        if !inner.changed {
            return Ok(None);
        }
        (inner.data.clone(), inner.renew)
    };

    let auth = &state.config.auth;

    if data.is_empty() {
        return match token {
            Some(token) => {
                state.sessions.remove(&token).await?;
                Ok(Some(clear_session_cookie(&auth.cookie_name)))
            }
            None => Ok(None),
        };
    }

    let (token, issue_cookie) = match token {
        Some(token) if !renew => (token, false),
        Some(old) => {
            state.sessions.remove(&old).await?;
            (generate_token(), true)
        }
        None => (generate_token(), true),
    };

    state.sessions.save(&token, &data).await?;

    Ok(issue_cookie.then(|| {
        session_cookie(
            &auth.cookie_name,
            &state.signer.sign(&token),
            auth.session_hours,
        )
    }))
}

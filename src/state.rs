use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{CredentialHasher, SessionSigner, SessionStore};
use crate::config::Config;
use crate::db::Store;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Everything a handler may touch, injected through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionStore>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub signer: SessionSigner,
    pub config: Config,
}

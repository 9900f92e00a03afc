#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use blog::auth::session::{MemorySessionStore, SessionStore};
use blog::auth::{BcryptHasher, SessionSigner};
use blog::config::Config;
use blog::db::{MemoryStore, PostRepository, Store};
use blog::routes;
use blog::state::AppState;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret";

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn redirects_to(&self, path: &str) -> bool {
        self.status.is_redirection() && self.location.as_deref() == Some(path)
    }
}

/// Drives the router in-process and keeps the session cookie between
/// requests the way a browser would.
pub struct TestClient {
    app: Router,
    cookie_name: String,
    cookie: Option<String>,
}

pub fn test_state(store: Arc<dyn Store>, sessions: Arc<dyn SessionStore>) -> AppState {
    AppState {
        store,
        sessions,
        hasher: Arc::new(BcryptHasher::new(4)),
        signer: SessionSigner::new(TEST_SECRET.to_vec()),
        config: Config::default(),
    }
}

/// A client over fresh in-memory stores, plus a handle on the post store.
pub fn memory_client() -> (TestClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = test_state(store.clone(), Arc::new(MemorySessionStore::new()));
    (TestClient::new(state), store)
}

impl TestClient {
    pub fn new(state: AppState) -> Self {
        let cookie_name = state.config.auth.cookie_name.clone();
        Self {
            app: routes::app(state),
            cookie_name,
            cookie: None,
        }
    }

    /// Another browser talking to the same server.
    pub fn fresh_browser(&self) -> Self {
        Self {
            app: self.app.clone(),
            cookie_name: self.cookie_name.clone(),
            cookie: None,
        }
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub fn set_cookie(&mut self, cookie: Option<String>) {
        self.cookie = cookie;
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = self.request("GET", path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = self
            .request("POST", path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// GET the redirect target of `response`.
    pub async fn follow(&mut self, response: &TestResponse) -> TestResponse {
        let location = response
            .location
            .clone()
            .expect("response is not a redirect");
        self.get(&location).await
    }

    pub async fn signup(&mut self, username: &str, password: &str) -> TestResponse {
        self.post("/signup", &[("username", username), ("password", password)])
            .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> TestResponse {
        self.post("/login", &[("username", username), ("password", password)])
            .await
    }

    pub async fn signup_and_login(&mut self, username: &str, password: &str) {
        let response = self.signup(username, password).await;
        assert!(response.redirects_to("/login"), "signup failed");
        let response = self.login(username, password).await;
        assert!(response.redirects_to("/"), "login failed");
        // Render once so the login flash does not leak into later pages.
        self.get("/").await;
    }

    fn request(&self, method: &str, path: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(path);
        match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap().trim();
            let (name, val) = pair.split_once('=').unwrap();
            if name == self.cookie_name {
                self.cookie = if val.is_empty() {
                    None
                } else {
                    Some(pair.to_string())
                };
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}

/// Id of the most recently created post.
pub async fn newest_post_id(store: &dyn Store) -> String {
    store.list_posts().await.unwrap()[0].id.clone()
}

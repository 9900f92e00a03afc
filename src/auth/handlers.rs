use askama::Template;
use axum::extract::State;
use axum::response::Redirect;
use axum::Form;
use serde::Deserialize;

use crate::auth::{hash_password, verify_password, FlashCategory, Session};
use crate::db::models::NewUser;
use crate::db::StoreError;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::{Html, Layout};
use crate::state::AppState;

/// Shown for every failed login, whichever factor was wrong.
pub const LOGIN_FAILED: &str = "Invalid username or password.";
pub const LOGIN_SUCCEEDED: &str = "Logged in successfully.";
pub const LOGGED_OUT: &str = "You have been logged out.";
pub const USERNAME_TAKEN: &str = "Username already exists.";
pub const SIGNUP_FIELDS_REQUIRED: &str = "Username and password are required.";
pub const SIGNED_UP: &str = "Account created. Please log in.";

const MAX_USERNAME_CHARS: usize = 64;

// -- Templates --

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub layout: Layout,
}

// -- Request types --

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

// -- Login / logout --

/// GET /login
pub async fn login_page(session: Session, MaybeUser(user): MaybeUser) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        layout: Layout::new(&session, user.as_ref()).await,
    })
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Redirect> {
    let username = form.username.trim();

    let user = if username.is_empty() || form.password.is_empty() {
        None
    } else {
        state.store.find_user(username).await?
    };

    let verified = match &user {
        Some(user) => {
            verify_password(
                state.hasher.clone(),
                form.password.clone(),
                user.password_hash.clone(),
            )
            .await?
        }
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::warn!("Failed login attempt for '{}'", username);
            session.flash(FlashCategory::Danger, LOGIN_FAILED).await;
            return Ok(Redirect::to("/login"));
        }
    };

    session.log_in(&user.username).await;
    session.flash(FlashCategory::Success, LOGIN_SUCCEEDED).await;
    tracing::info!("User '{}' logged in", user.username);

    Ok(Redirect::to("/"))
}

/// GET /logout
pub async fn logout(session: Session) -> Redirect {
    if let Some(username) = session.username().await {
        tracing::info!("User '{}' logged out", username);
    }
    session.clear().await;
    session.flash(FlashCategory::Success, LOGGED_OUT).await;

    Redirect::to("/")
}

// -- Signup --

/// GET /signup
pub async fn signup_page(session: Session, MaybeUser(user): MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        layout: Layout::new(&session, user.as_ref()).await,
    })
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Redirect> {
    let username = form.username.trim();

    if username.is_empty() || form.password.is_empty() {
        session
            .flash(FlashCategory::Danger, SIGNUP_FIELDS_REQUIRED)
            .await;
        return Ok(Redirect::to("/signup"));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        session
            .flash(
                FlashCategory::Danger,
                format!("Username must be {} characters or less.", MAX_USERNAME_CHARS),
            )
            .await;
        return Ok(Redirect::to("/signup"));
    }

    if state.store.find_user(username).await?.is_some() {
        session.flash(FlashCategory::Danger, USERNAME_TAKEN).await;
        return Ok(Redirect::to("/signup"));
    }

    let password_hash = hash_password(state.hasher.clone(), form.password.clone()).await?;

    // The lookup above can race with another signup; the store has the
    // final word on uniqueness.
    match state
        .store
        .insert_user(NewUser {
            username: username.to_string(),
            password_hash,
        })
        .await
    {
        Ok(_) => {}
        Err(StoreError::Conflict(_)) => {
            session.flash(FlashCategory::Danger, USERNAME_TAKEN).await;
            return Ok(Redirect::to("/signup"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!("New account '{}' created", username);
    session.flash(FlashCategory::Success, SIGNED_UP).await;

    Ok(Redirect::to("/login"))
}

use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::{policy, FlashCategory, Session};
use crate::db::models::{Comment, NewComment, NewPost, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::{parse_and_format_time, Html, Layout};
use crate::state::AppState;

pub const LOGIN_REQUIRED: &str = "Please log in first.";
pub const NOT_AUTHOR: &str = "You are not authorized to modify this post.";
pub const POST_FIELDS_REQUIRED: &str = "Title and content are required.";
pub const COMMENT_REQUIRED: &str = "Comment cannot be empty.";

const MAX_TITLE_CHARS: usize = 200;
const MAX_CONTENT_CHARS: usize = 20_000;
const MAX_COMMENT_CHARS: usize = 2_000;

// --- View structs ---

pub struct PostView {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: String,
    pub edited: bool,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            edited: post.updated_at != post.created_at,
            created_at: parse_and_format_time(&post.created_at),
            id: post.id,
            title: post.title,
            content: post.content,
            author: post.author,
        }
    }
}

pub struct CommentView {
    pub author: String,
    pub content: String,
    pub created_at: String,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            author: comment.author,
            content: comment.content,
            created_at: parse_and_format_time(&comment.created_at),
        }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub layout: Layout,
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub can_modify: bool,
    pub can_comment: bool,
}

#[derive(Template)]
#[template(path = "create.html")]
pub struct CreateTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "edit.html")]
pub struct EditTemplate {
    pub layout: Layout,
    pub id: String,
    pub title: String,
    pub content: String,
}

// --- Forms ---

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CommentForm {
    pub content: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}", get(view_post))
        .route("/create", get(create_page).post(create_post))
        .route("/edit/{id}", get(edit_page).post(edit_post))
        .route("/delete/{id}", get(delete_post))
        .route("/comment/{id}", post(create_comment))
}

// --- Handlers ---

async fn view_post(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostTemplate>> {
    let post = find_post(&state, &id).await?;
    let comments = state
        .store
        .comments_for_post(&post.id)
        .await?
        .into_iter()
        .map(CommentView::from)
        .collect();

    Ok(Html(PostTemplate {
        can_modify: policy::is_author(user.as_ref(), &post.author),
        can_comment: policy::is_authenticated(user.as_ref()),
        layout: Layout::new(&session, user.as_ref()).await,
        post: post.into(),
        comments,
    }))
}

async fn create_page(session: Session, MaybeUser(user): MaybeUser) -> Html<CreateTemplate> {
    Html(CreateTemplate {
        layout: Layout::new(&session, user.as_ref()).await,
    })
}

async fn create_post(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Form(form): Form<PostForm>,
) -> AppResult<Redirect> {
    let user = match require_login(&session, user).await {
        Ok(user) => user,
        Err(redirect) => return Ok(redirect),
    };

    if let Err(message) = validate_post(&form) {
        session.flash(FlashCategory::Danger, message).await;
        return Ok(Redirect::to("/create"));
    }

    let id = state
        .store
        .insert_post(NewPost {
            title: form.title,
            content: form.content,
            author: user.username.clone(),
        })
        .await?;
    tracing::info!("Post {} created by {}", id, user.username);

    Ok(Redirect::to("/"))
}

async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = find_post(&state, &id).await?;
    if let Err(redirect) = require_author(&session, user.as_ref(), &post).await {
        return Ok(redirect.into_response());
    }

    Ok(Html(EditTemplate {
        layout: Layout::new(&session, user.as_ref()).await,
        id: post.id,
        title: post.title,
        content: post.content,
    })
    .into_response())
}

async fn edit_post(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> AppResult<Redirect> {
    let post = find_post(&state, &id).await?;
    if let Err(redirect) = require_author(&session, user.as_ref(), &post).await {
        return Ok(redirect);
    }

    if let Err(message) = validate_post(&form) {
        session.flash(FlashCategory::Danger, message).await;
        return Ok(Redirect::to(&format!("/edit/{}", post.id)));
    }

    if !state
        .store
        .update_post(&post.id, &form.title, &form.content)
        .await?
    {
        return Err(AppError::NotFound);
    }
    tracing::info!("Post {} edited by {}", post.id, post.author);
    session.flash(FlashCategory::Success, "Post updated.").await;

    Ok(Redirect::to(&format!("/post/{}", post.id)))
}

/// Deletes on GET; links on the post page point here.
async fn delete_post(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let post = find_post(&state, &id).await?;
    if let Err(redirect) = require_author(&session, user.as_ref(), &post).await {
        return Ok(redirect);
    }

    state.store.delete_post(&post.id).await?;
    let removed = state.store.delete_comments_for_post(&post.id).await?;
    tracing::info!(
        "Post {} deleted by {} along with {} comments",
        post.id,
        post.author,
        removed
    );
    session.flash(FlashCategory::Success, "Post deleted.").await;

    Ok(Redirect::to("/"))
}

async fn create_comment(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Redirect> {
    let user = match require_login(&session, user).await {
        Ok(user) => user,
        Err(redirect) => return Ok(redirect),
    };

    let post = find_post(&state, &id).await?;
    let post_url = format!("/post/{}", post.id);

    let trimmed = form.content.trim();
    if trimmed.is_empty() {
        session.flash(FlashCategory::Danger, COMMENT_REQUIRED).await;
        return Ok(Redirect::to(&post_url));
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        session
            .flash(
                FlashCategory::Danger,
                format!("Comment must be {} characters or less.", MAX_COMMENT_CHARS),
            )
            .await;
        return Ok(Redirect::to(&post_url));
    }

    state
        .store
        .insert_comment(NewComment {
            post_id: post.id,
            content: form.content,
            author: user.username,
        })
        .await?;

    Ok(Redirect::to(&post_url))
}

// --- Helpers ---

/// Unknown and malformed ids both resolve to 404.
async fn find_post(state: &AppState, id: &str) -> AppResult<Post> {
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(AppError::NotFound);
    }
    state.store.find_post(id).await?.ok_or(AppError::NotFound)
}

async fn require_login(
    session: &Session,
    user: Option<CurrentUser>,
) -> Result<CurrentUser, Redirect> {
    match user {
        Some(user) => Ok(user),
        None => {
            session.flash(FlashCategory::Danger, LOGIN_REQUIRED).await;
            Err(Redirect::to("/login"))
        }
    }
}

/// Refusals fall back to the read-only post page.
async fn require_author(
    session: &Session,
    user: Option<&CurrentUser>,
    post: &Post,
) -> Result<(), Redirect> {
    if policy::is_author(user, &post.author) {
        return Ok(());
    }

    tracing::warn!(
        "{} tried to modify post {} owned by {}",
        user.map(|u| u.username.as_str()).unwrap_or("anonymous"),
        post.id,
        post.author
    );
    session.flash(FlashCategory::Danger, NOT_AUTHOR).await;
    Err(Redirect::to(&format!("/post/{}", post.id)))
}

/// Whitespace only counts against blankness and length; the stored text is
/// the text as submitted.
fn validate_post(form: &PostForm) -> Result<(), String> {
    let title = form.title.trim();
    let content = form.content.trim();

    if title.is_empty() || content.is_empty() {
        return Err(POST_FIELDS_REQUIRED.to_string());
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(format!(
            "Title must be {} characters or less.",
            MAX_TITLE_CHARS
        ));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(format!(
            "Content must be {} characters or less.",
            MAX_CONTENT_CHARS
        ));
    }

    Ok(())
}

use askama::Template;
use axum::extract::State;

use crate::auth::Session;
use crate::db::models::Post;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::{parse_and_format_time, Html, Layout};
use crate::state::AppState;

const EXCERPT_CHARS: usize = 280;

pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub created_at: String,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        Self {
            excerpt: excerpt(&post.content, EXCERPT_CHARS),
            created_at: parse_and_format_time(&post.created_at),
            id: post.id,
            title: post.title,
            author: post.author,
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub posts: Vec<PostSummary>,
}

pub async fn index(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
) -> AppResult<Html<HomeTemplate>> {
    let posts = state
        .store
        .list_posts()
        .await?
        .into_iter()
        .map(PostSummary::from)
        .collect();

    Ok(Html(HomeTemplate {
        layout: Layout::new(&session, user.as_ref()).await,
        posts,
    }))
}

fn excerpt(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

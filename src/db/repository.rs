// Repository traits - the only way handlers touch persisted records
use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{Comment, NewComment, NewPost, NewUser, Post, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError>;

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError>;

    /// Insert a post and return its store-assigned id.
    async fn insert_post(&self, post: NewPost) -> Result<String, StoreError>;

    /// Overwrite title and content. Returns false if no such post.
    async fn update_post(&self, id: &str, title: &str, content: &str)
        -> Result<bool, StoreError>;

    /// Returns false if no such post.
    async fn delete_post(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments referencing `post_id`, oldest first.
    async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, StoreError>;

    async fn insert_comment(&self, comment: NewComment) -> Result<String, StoreError>;

    /// Returns the number of comments removed.
    async fn delete_comments_for_post(&self, post_id: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Conflict` when the username is taken.
    async fn insert_user(&self, user: NewUser) -> Result<String, StoreError>;
}

/// Everything the handlers need from the document store.
pub trait Store: PostRepository + CommentRepository + UserRepository {}

impl<T> Store for T where T: PostRepository + CommentRepository + UserRepository {}

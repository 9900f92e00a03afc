use async_trait::async_trait;
use rusqlite::{params, ErrorCode, Row};

use crate::db::models::{now_timestamp, Comment, NewComment, NewPost, NewUser, Post, User};
use crate::db::repository::{CommentRepository, PostRepository, StoreError, UserRepository};
use crate::state::DbPool;

/// SQLite implementation of the blog repositories.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl PostRepository for SqliteStore {
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, content, author, created_at, updated_at
             FROM posts
             ORDER BY created_at DESC, id DESC",
        )?;

        let posts = stmt
            .query_map([], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "SELECT id, title, content, author, created_at, updated_at
             FROM posts WHERE id = ?1",
            params![id],
            post_from_row,
        );

        match result {
            Ok(post) => Ok(Some(post)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_post(&self, post: NewPost) -> Result<String, StoreError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO posts (id, title, content, author, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, post.title, post.content, post.author, now_timestamp()],
        )?;
        Ok(id)
    }

    async fn update_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE posts SET title = ?2, content = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, title, content, now_timestamp()],
        )?;
        Ok(rows > 0)
    }

    async fn delete_post(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[async_trait]
impl CommentRepository for SqliteStore {
    async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, post_id, content, author, created_at
             FROM comments
             WHERE post_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let comments = stmt
            .query_map(params![post_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<String, StoreError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO comments (id, post_id, content, author, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                comment.post_id,
                comment.content,
                comment.author,
                now_timestamp()
            ],
        )?;
        Ok(id)
    }

    async fn delete_comments_for_post(&self, post_id: &str) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM comments WHERE post_id = ?1", params![post_id])?;
        Ok(rows as u64)
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_user(&self, user: NewUser) -> Result<String, StoreError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        match conn.execute(
            "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, ?3)",
            params![id, user.username, user.password_hash],
        ) {
            Ok(_) => Ok(id),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

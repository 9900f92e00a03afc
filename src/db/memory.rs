use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::models::{now_timestamp, Comment, NewComment, NewPost, NewUser, Post, User};
use crate::db::repository::{CommentRepository, PostRepository, StoreError, UserRepository};

/// In-process store used by tests and throwaway instances. Records are kept
/// in insertion order, so newest-first listing is a reverse walk.
#[derive(Default)]
pub struct MemoryStore {
    posts: RwLock<Vec<Post>>,
    comments: RwLock<Vec<Comment>>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self.posts.read().await.iter().rev().cloned().collect())
    }

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_post(&self, post: NewPost) -> Result<String, StoreError> {
        let id = uuid::Uuid::now_v7().to_string();
        let now = now_timestamp();
        self.posts.write().await.push(Post {
            id: id.clone(),
            title: post.title,
            content: post.content,
            author: post.author,
            created_at: now.clone(),
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;
        match posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.title = title.to_string();
                post.content = content.to_string();
                post.updated_at = now_timestamp();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_post(&self, id: &str) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() < before)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, StoreError> {
        Ok(self
            .comments
            .read()
            .await
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<String, StoreError> {
        let id = uuid::Uuid::now_v7().to_string();
        self.comments.write().await.push(Comment {
            id: id.clone(),
            post_id: comment.post_id,
            content: comment.content,
            author: comment.author,
            created_at: now_timestamp(),
        });
        Ok(id)
    }

    async fn delete_comments_for_post(&self, post_id: &str) -> Result<u64, StoreError> {
        let mut comments = self.comments.write().await;
        let before = comments.len();
        comments.retain(|c| c.post_id != post_id);
        Ok((before - comments.len()) as u64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<String, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }

        let id = uuid::Uuid::now_v7().to_string();
        users.push(User {
            id: id.clone(),
            username: user.username,
            password_hash: user.password_hash,
            created_at: now_timestamp(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_posts_is_newest_first() {
        let store = MemoryStore::new();
        for title in ["first", "second"] {
            store
                .insert_post(NewPost {
                    title: title.to_string(),
                    content: String::new(),
                    author: "alice".to_string(),
                })
                .await
                .unwrap();
        }

        let titles: Vec<String> = store
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn delete_post_reports_whether_anything_was_removed() {
        let store = MemoryStore::new();
        let id = store
            .insert_post(NewPost {
                title: "t".to_string(),
                content: "c".to_string(),
                author: "alice".to_string(),
            })
            .await
            .unwrap();

        assert!(store.delete_post(&id).await.unwrap());
        assert!(!store.delete_post(&id).await.unwrap());
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        let user = NewUser {
            username: "alice".to_string(),
            password_hash: "h".to_string(),
        };
        store.insert_user(user.clone()).await.unwrap();
        assert!(matches!(
            store.insert_user(user).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.users.read().await.len(), 1);
    }
}

//! Post repository.

use std::sync::Arc;

use blog_core::{AppError, AppResult};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::rid::{IdGenerator, ResourceKind};
use crate::{Page, Post, UpdatePostParams};

/// In-memory post table, kept in insertion order.
#[derive(Debug, Clone)]
pub struct PostRepository {
    rows: Arc<RwLock<Vec<Post>>>,
    ids: Arc<IdGenerator>,
}

impl Default for PostRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Row filter for post queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter<'a> {
    /// Restrict to posts owned by this user.
    pub owner: Option<&'a str>,
    /// Substring the title must contain.
    pub title: Option<&'a str>,
}

impl PostFilter<'_> {
    fn matches(&self, post: &Post) -> bool {
        self.owner.map_or(true, |owner| post.user_id == owner)
            && self.title.map_or(true, |title| post.title.contains(title))
    }
}

impl PostRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Arc::default(),
            ids: Arc::new(IdGenerator::new(ResourceKind::Post)),
        }
    }

    pub async fn create_post(&self, user_id: &str, title: &str, content: &str) -> AppResult<Post> {
        let now = Utc::now();
        let post = Post {
            post_id: self.ids.next_id(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.push(post.clone());
        Ok(post)
    }

    /// Fetch a post visible under `filter`.
    pub async fn get_post(&self, post_id: &str, filter: PostFilter<'_>) -> AppResult<Post> {
        self.rows
            .read()
            .await
            .iter()
            .find(|p| p.post_id == post_id && filter.matches(p))
            .cloned()
            .ok_or_else(|| AppError::not_found("Post", post_id))
    }

    pub async fn update_post(
        &self,
        post_id: &str,
        filter: PostFilter<'_>,
        params: UpdatePostParams<'_>,
    ) -> AppResult<Post> {
        let mut rows = self.rows.write().await;
        let post = rows
            .iter_mut()
            .find(|p| p.post_id == post_id && filter.matches(p))
            .ok_or_else(|| AppError::not_found("Post", post_id))?;

        if let Some(title) = params.title {
            post.title = title.to_string();
        }
        if let Some(content) = params.content {
            post.content = content.to_string();
        }
        post.updated_at = Utc::now();

        Ok(post.clone())
    }

    /// Delete the listed posts that match `filter`; returns how many were removed.
    pub async fn delete_posts(&self, post_ids: &[String], filter: PostFilter<'_>) -> AppResult<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|p| !(post_ids.contains(&p.post_id) && filter.matches(p)));
        Ok(before - rows.len())
    }

    /// Delete every post owned by `user_id`.
    pub async fn delete_user_posts(&self, user_id: &str) -> AppResult<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|p| p.user_id != user_id);
        Ok(before - rows.len())
    }

    pub async fn list_posts(&self, page: Page, filter: PostFilter<'_>) -> AppResult<(i64, Vec<Post>)> {
        let rows = self.rows.read().await;
        let matching: Vec<&Post> = rows.iter().filter(|p| filter.matches(p)).collect();
        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let window = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        Ok((total, window))
    }

    /// Number of posts owned by `user_id`.
    pub async fn count_user_posts(&self, user_id: &str) -> AppResult<i64> {
        let count = self
            .rows
            .read()
            .await
            .iter()
            .filter(|p| p.user_id == user_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned_by(user_id: &str) -> PostFilter<'_> {
        PostFilter {
            owner: Some(user_id),
            title: None,
        }
    }

    #[tokio::test]
    async fn posts_are_scoped_to_their_owner() {
        let repo = PostRepository::new();
        let post = repo.create_post("user-a", "hello", "world").await.unwrap();

        assert!(repo.get_post(&post.post_id, owned_by("user-a")).await.is_ok());
        assert!(matches!(
            repo.get_post(&post.post_id, owned_by("user-b")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn count_and_cascade_delete() {
        let repo = PostRepository::new();
        repo.create_post("user-a", "one", "x").await.unwrap();
        repo.create_post("user-a", "two", "x").await.unwrap();
        repo.create_post("user-b", "three", "x").await.unwrap();

        assert_eq!(repo.count_user_posts("user-a").await.unwrap(), 2);
        assert_eq!(repo.delete_user_posts("user-a").await.unwrap(), 2);
        assert_eq!(repo.count_user_posts("user-a").await.unwrap(), 0);
        assert_eq!(repo.count_user_posts("user-b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn title_filter_and_paging() {
        let repo = PostRepository::new();
        for title in ["rust async", "go channels", "rust traits"] {
            repo.create_post("user-a", title, "x").await.unwrap();
        }

        let filter = PostFilter {
            owner: Some("user-a"),
            title: Some("rust"),
        };
        let (total, posts) = repo.list_posts(Page::new(0, 1), filter).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(posts[0].title, "rust async");
    }

    #[tokio::test]
    async fn delete_only_touches_owned_posts() {
        let repo = PostRepository::new();
        let mine = repo.create_post("user-a", "mine", "x").await.unwrap();
        let theirs = repo.create_post("user-b", "theirs", "x").await.unwrap();

        let ids = vec![mine.post_id.clone(), theirs.post_id.clone()];
        assert_eq!(repo.delete_posts(&ids, owned_by("user-a")).await.unwrap(), 1);
        assert!(repo.get_post(&theirs.post_id, PostFilter::default()).await.is_ok());
    }
}

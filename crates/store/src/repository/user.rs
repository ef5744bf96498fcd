//! User repository.

use std::sync::Arc;

use blog_core::{AppError, AppResult};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::rid::{IdGenerator, ResourceKind};
use crate::{CreateUserParams, Page, UpdateUserParams, User};

/// In-memory user table, kept in insertion order.
#[derive(Debug, Clone)]
pub struct UserRepository {
    rows: Arc<RwLock<Vec<User>>>,
    ids: Arc<IdGenerator>,
}

impl Default for UserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Arc::default(),
            ids: Arc::new(IdGenerator::new(ResourceKind::User)),
        }
    }

    /// Create a user with a generated id.
    pub async fn create_user(&self, params: CreateUserParams<'_>) -> AppResult<User> {
        let user_id = self.ids.next_id();
        self.insert_user(&user_id, params).await
    }

    /// Create a user with a caller-chosen id (bootstrap accounts).
    pub async fn insert_user(&self, user_id: &str, params: CreateUserParams<'_>) -> AppResult<User> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|u| u.username == params.username) {
            return Err(AppError::already_exists("User", "username"));
        }
        if rows.iter().any(|u| u.user_id == user_id) {
            return Err(AppError::already_exists("User", "id"));
        }

        let now = Utc::now();
        let user = User {
            user_id: user_id.to_string(),
            username: params.username.to_string(),
            password: params.password_hash.to_string(),
            nickname: params.nickname.to_string(),
            email: params.email.to_string(),
            phone: params.phone.to_string(),
            created_at: now,
            updated_at: now,
        };
        rows.push(user.clone());
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<User> {
        self.rows
            .read()
            .await
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        self.rows
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| AppError::not_found("User", username))
    }

    /// Apply a partial update and return the new row.
    pub async fn update_user(&self, user_id: &str, params: UpdateUserParams<'_>) -> AppResult<User> {
        let mut rows = self.rows.write().await;
        if let Some(username) = params.username {
            if rows
                .iter()
                .any(|u| u.username == username && u.user_id != user_id)
            {
                return Err(AppError::already_exists("User", "username"));
            }
        }

        let user = rows
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| AppError::not_found("User", user_id))?;

        if let Some(username) = params.username {
            user.username = username.to_string();
        }
        if let Some(password_hash) = params.password_hash {
            user.password = password_hash.to_string();
        }
        if let Some(nickname) = params.nickname {
            user.nickname = nickname.to_string();
        }
        if let Some(email) = params.email {
            user.email = email.to_string();
        }
        if let Some(phone) = params.phone {
            user.phone = phone.to_string();
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    /// Delete a user. Returns whether a row was removed.
    pub async fn delete_user(&self, user_id: &str) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|u| u.user_id != user_id);
        Ok(rows.len() != before)
    }

    /// Page through users, optionally restricted to one id.
    ///
    /// Returns the total number of matching rows and the requested window.
    pub async fn list_users(&self, page: Page, only: Option<&str>) -> AppResult<(i64, Vec<User>)> {
        let rows = self.rows.read().await;
        let matching: Vec<&User> = rows
            .iter()
            .filter(|u| only.map_or(true, |id| u.user_id == id))
            .collect();
        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let window = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        Ok((total, window))
    }
}

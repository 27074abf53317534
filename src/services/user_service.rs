/*
 * Responsibility
 * - users のビジネスルール (username の一意性)
 * - 永続化は UserStore に委譲 (transaction 境界も store 側)
 */
use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::repos::{NewUser, UserRow, UserStore, error::RepoError};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("store", &self.store.backend_name())
            .finish()
    }
}

fn username_taken(username: &str) -> AppError {
    AppError::business_rule(format!("Username '{username}' is already taken"))
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<UserRow, AppError> {
        tracing::debug!(username, "creating user");

        if self.store.exists_by_username(username).await? {
            return Err(username_taken(username));
        }

        let user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
            created_at: Utc::now(),
        };

        // A concurrent create can still win the race between the check and the insert.
        let row = self.store.create(user).await.map_err(|e| match e {
            RepoError::Conflict => username_taken(username),
            other => other.into(),
        })?;

        tracing::info!(user_id = row.id, "user created");
        Ok(row)
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<UserRow>, AppError> {
        Ok(self.store.get(user_id).await?)
    }

    pub async fn find_all(&self) -> Result<Vec<UserRow>, AppError> {
        Ok(self.store.list().await?)
    }

    pub async fn exists_by_id(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.store.get(user_id).await?.is_some())
    }

    /// Returns `false` when there was nothing to delete.
    pub async fn delete_by_id(&self, user_id: i64) -> Result<bool, AppError> {
        tracing::info!(user_id, "deleting user");
        Ok(self.store.delete(user_id).await?)
    }
}

/*
 * Responsibility
 * - users の永続化 (数値 ID → UserRow、username は一意)
 * - UserStore trait を境界として in-memory 実装と Postgres (SQLx) 実装を差し替え可能にする
 * - username 重複は RepoError::Conflict で返す (in-memory は同一ロック内、Postgres は unique index)
 */
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::repos::error::RepoError;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRow {
    #[sqlx(rename = "userId")]
    pub id: i64,
    #[sqlx(rename = "userName")]
    pub username: String,
    pub email: String,
    #[sqlx(rename = "fullName")]
    pub full_name: Option<String>,
    #[sqlx(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[sqlx(rename = "lastLogin")]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    // Returns the store backend name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn list(&self) -> Result<Vec<UserRow>, RepoError>;

    // Returns `Err(RepoError::Conflict)` if the username is already taken.
    async fn create(&self, user: NewUser) -> Result<UserRow, RepoError>;

    async fn get(&self, user_id: i64) -> Result<Option<UserRow>, RepoError>;

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError>;

    // Returns `true` when a row was removed.
    async fn delete(&self, user_id: i64) -> Result<bool, RepoError>;
}

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, UserRow>,
}

/// Process-local store used when no `DATABASE_URL` is configured.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    table: Mutex<Table>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<R>(&self, f: impl FnOnce(&mut Table) -> R) -> R {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut table)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<UserRow>, RepoError> {
        Ok(self.with_table(|t| t.rows.values().cloned().collect()))
    }

    async fn create(&self, user: NewUser) -> Result<UserRow, RepoError> {
        self.with_table(|t| {
            if t.rows.values().any(|r| r.username == user.username) {
                return Err(RepoError::Conflict);
            }

            t.last_id += 1;
            let row = UserRow {
                id: t.last_id,
                username: user.username,
                email: user.email,
                full_name: user.full_name,
                created_at: user.created_at,
                last_login: None,
            };
            t.rows.insert(row.id, row.clone());
            Ok(row)
        })
    }

    async fn get(&self, user_id: i64) -> Result<Option<UserRow>, RepoError> {
        Ok(self.with_table(|t| t.rows.get(&user_id).cloned()))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError> {
        Ok(self.with_table(|t| t.rows.values().any(|r| r.username == username)))
    }

    async fn delete(&self, user_id: i64) -> Result<bool, RepoError> {
        Ok(self.with_table(|t| t.rows.remove(&user_id).is_some()))
    }
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Creates the `users` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                "userId"    BIGSERIAL PRIMARY KEY,
                "userName"  VARCHAR(50)  NOT NULL UNIQUE,
                email       VARCHAR(100) NOT NULL,
                "fullName"  VARCHAR(100),
                "createdAt" TIMESTAMPTZ  NOT NULL,
                "lastLogin" TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self) -> Result<Vec<UserRow>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT "userId", "userName", email, "fullName", "createdAt", "lastLogin"
            FROM users
            ORDER BY "userId"
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn create(&self, user: NewUser) -> Result<UserRow, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users ("userName", email, "fullName", "createdAt")
            VALUES ($1, $2, $3, $4)
            RETURNING "userId", "userName", email, "fullName", "createdAt", "lastLogin"
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.full_name.as_deref())
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row)
    }

    async fn get(&self, user_id: i64) -> Result<Option<UserRow>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT "userId", "userName", email, "fullName", "createdAt", "lastLogin"
            FROM users
            WHERE "userId" = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM users WHERE "userName" = $1)"#)
                .bind(username)
                .fetch_one(&self.db)
                .await?;

        Ok(exists)
    }

    async fn delete(&self, user_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE "userId" = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            full_name: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let store = InMemoryUserStore::new();
        let a = store.create(new_user("alice")).await.unwrap();
        let b = store.create(new_user("bob")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = InMemoryUserStore::new();
        store.create(new_user("alice")).await.unwrap();

        let err = store.create(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict));
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let store = InMemoryUserStore::new();
        let a = store.create(new_user("alice")).await.unwrap();

        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(store.get(a.id).await.unwrap().is_none());

        let b = store.create(new_user("bob")).await.unwrap();
        assert_ne!(a.id, b.id);
    }
}

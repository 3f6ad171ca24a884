//! Administrator model and repository.

use sqlx::SqlitePool;

use crate::{PortalError, Result};

/// An administrator allowed to modify the folder tree.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Admin {
    /// Unique administrator ID.
    pub id: i64,
    /// Login name (unique).
    pub login: String,
    /// Argon2 password hash.
    pub password: String,
    /// When the account was created.
    pub created_at: String,
}

/// Repository for administrator rows.
pub struct AdminRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AdminRepository<'a> {
    /// Create a new AdminRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an administrator. `password_hash` must already be hashed.
    pub async fn create(&self, login: &str, password_hash: &str) -> Result<Admin> {
        let result = sqlx::query("INSERT INTO admins (login, password) VALUES (?, ?)")
            .bind(login)
            .bind(password_hash)
            .execute(self.pool)
            .await
            .map_err(|e| PortalError::Store(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PortalError::NotFound("admin".to_string()))
    }

    /// Get an administrator by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, login, password, created_at FROM admins WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(admin)
    }

    /// Get an administrator by exact login.
    pub async fn get_by_login(&self, login: &str) -> Result<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, login, password, created_at FROM admins WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(self.pool)
        .await?;

        Ok(admin)
    }

    /// Count administrators.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "user_id, name, email, password_hash, created_at, updated_at";

/// User row from the database. Deliberately not Serialize: the password hash
/// must never reach a client-facing payload, so handlers project safe fields
/// explicitly.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct UserRepo;

impl UserRepo {
    /// Insert a user and return the stored row. `password_hash` is None for
    /// profiles created without credentials.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        email: &str,
        password_hash: Option<&str>,
        name: Option<&str>,
    ) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (user_id, email, password_hash, name) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to create user")?;
        Ok(row)
    }

    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;
        Ok(row)
    }

    pub async fn get_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by id")?;
        Ok(row)
    }

    /// Partial profile update; None leaves a column untouched. Returns the
    /// updated row, or None if the user no longer exists.
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                email = COALESCE($2, email),
                updated_at = NOW()
            WHERE user_id = $3
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(name)
        .bind(email)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to update user")?;
        Ok(row)
    }

    /// Delete a user; owned todos cascade. Returns false if no row matched.
    pub async fn delete(pool: &PgPool, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }
}

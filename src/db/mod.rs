//! Postgres-backed stores.
//!
//! One connection pool shared by the conversation and team stores. The
//! schema belongs to the helpdesk application; this crate only reads it
//! and updates conversation assignees.

pub mod conversation;
pub mod team;

use crate::error::{Error, Result};
use crate::model::User;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Look up the system actor that automatic assignments are attributed to.
    pub async fn system_user(&self, email: &str) -> Result<User> {
        let row: Option<(i32, String)> =
            sqlx::query_as("SELECT id, email FROM users WHERE email = $1 AND deleted_at IS NULL")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, email)| User::new(id, email))
            .ok_or_else(|| Error::NotFound(format!("system user {email}")))
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

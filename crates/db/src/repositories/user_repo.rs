//! Repository for the `users` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "user_id, external_auth_id, email, email_verified, tier, \
                       created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row. Email is lowercased.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (external_auth_id, email, email_verified)
             VALUES ($1, lower($2), $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.external_auth_id)
            .bind(&input.email)
            .bind(input.email_verified)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE user_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by the identity provider's subject.
    pub async fn find_by_external_id(
        pool: &PgPool,
        external_auth_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE external_auth_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(external_auth_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email, case-insensitively.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Find-or-create the local user for a verified external identity.
    ///
    /// Resolution order:
    /// 1. By `external_auth_id` — the common case after first login.
    /// 2. By email — a transitional row created before the external link
    ///    existed; the link is recorded now.
    /// 3. Otherwise a fresh row is inserted.
    pub async fn sync_external(
        pool: &PgPool,
        external_auth_id: &str,
        email: &str,
        email_verified: bool,
    ) -> Result<User, sqlx::Error> {
        if let Some(user) = Self::find_by_external_id(pool, external_auth_id).await? {
            return Ok(user);
        }

        if let Some(user) = Self::find_by_email(pool, email).await? {
            let query = format!(
                "UPDATE users
                 SET external_auth_id = $2, email_verified = $3, updated_at = now()
                 WHERE user_id = $1
                 RETURNING {COLUMNS}"
            );
            return sqlx::query_as::<_, User>(&query)
                .bind(user.user_id)
                .bind(external_auth_id)
                .bind(email_verified)
                .fetch_one(pool)
                .await;
        }

        match Self::create(
            pool,
            &CreateUser {
                external_auth_id: external_auth_id.to_string(),
                email: email.to_string(),
                email_verified,
            },
        )
        .await
        {
            Ok(user) => Ok(user),
            // Two first requests can race; the loser re-reads the winner's row.
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Self::find_by_external_id(pool, external_auth_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)
            }
            Err(e) => Err(e),
        }
    }
}

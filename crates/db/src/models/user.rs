//! User entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use scenedex_core::types::Timestamp;

/// Subscription tier, persisted as its lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserTier {
    Free,
    Pro,
    Enterprise,
}

/// A row from the `users` table.
///
/// `external_auth_id` is the identity provider's subject; it is nullable
/// only for rows created before the external link was recorded.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub external_auth_id: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub tier: UserTier,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a user on first authenticated request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub external_auth_id: String,
    /// Stored lowercased; uniqueness is case-insensitive.
    pub email: String,
    pub email_verified: bool,
}

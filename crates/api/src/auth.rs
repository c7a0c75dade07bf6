//! Authenticated-user extractor.
//!
//! Token validation is delegated to the identity provider: an upstream
//! gateway verifies the session and injects the subject and email as
//! trusted headers. This extractor consumes that verified identity and
//! finds-or-creates the local user row on first sight.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use scenedex_core::error::CoreError;
use scenedex_db::models::user::UserTier;
use scenedex_db::repositories::UserRepo;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the identity provider's verified subject.
pub const USER_ID_HEADER: &str = "x-auth-user-id";

/// Header carrying the verified email address.
pub const EMAIL_HEADER: &str = "x-auth-email";

/// Optional header: `"true"` when the provider verified the email.
pub const EMAIL_VERIFIED_HEADER: &str = "x-auth-email-verified";

/// Authenticated user resolved from the gateway-injected identity headers.
///
/// Use this as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's local database id.
    pub user_id: Uuid,
    pub email: String,
    pub tier: UserTier,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let external_id = header_value(parts, USER_ID_HEADER).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(format!(
                "Missing {USER_ID_HEADER} header"
            )))
        })?;

        let email = header_value(parts, EMAIL_HEADER).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(format!(
                "Missing {EMAIL_HEADER} header"
            )))
        })?;

        let email_verified = header_value(parts, EMAIL_VERIFIED_HEADER)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let user = UserRepo::sync_external(&state.pool, &external_id, &email, email_verified)
            .await
            .map_err(AppError::Database)?;

        Ok(AuthUser {
            user_id: user.user_id,
            email: user.email,
            tier: user.tier,
        })
    }
}

/// Read a header as a non-empty string.
fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

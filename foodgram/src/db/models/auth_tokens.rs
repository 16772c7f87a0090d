//! Database models for auth tokens.

use crate::types::{TokenId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database response for an auth token row. Only the digest of the token is ever stored.
#[derive(Debug, Clone, FromRow)]
pub struct AuthTokenDBResponse {
    pub id: TokenId,
    pub user_id: UserId,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Database request for updating a user
///
/// `None` leaves a column untouched. `avatar` is doubly optional so the avatar can be cleared.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub avatar: Option<Option<String>>,
}

/// Database response for a user (same as the row)
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    /// Path of the avatar relative to the media root
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

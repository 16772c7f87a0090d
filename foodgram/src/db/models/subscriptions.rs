use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A follower/author pair
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionDBResponse {
    pub id: i64,
    pub user_id: UserId,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}

//! Database repository for follower to author subscriptions.

use crate::db::{
    errors::Result,
    models::{subscriptions::SubscriptionDBResponse, users::UserDBResponse},
};
use crate::types::UserId;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

/// Unique constraint guarding duplicate subscriptions
pub const SUBSCRIPTION_UNIQUE: &str = "subscriptions_user_author_unique";

/// Check constraint forbidding self-subscription
pub const NO_SELF_FOLLOW: &str = "subscriptions_no_self_follow";

pub struct Subscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn create(&mut self, user_id: UserId, author_id: UserId) -> Result<SubscriptionDBResponse> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(
            "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, user_id: UserId, author_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Authors the user follows, most recently followed first
    #[instrument(skip(self), err)]
    pub async fn list_authors(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<UserDBResponse>> {
        let authors = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT u.*
            FROM subscriptions s
            INNER JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(authors)
    }

    #[instrument(skip(self), err)]
    pub async fn count_authors(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Which of the given authors the user follows
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn followed_among(&mut self, user_id: UserId, author_ids: &[UserId]) -> Result<HashSet<UserId>> {
        if author_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let followed = sqlx::query_scalar::<_, UserId>(
            "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
        )
        .bind(user_id)
        .bind(author_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(followed.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_subscribe_and_list(pool: PgPool) {
        let reader = create_test_user(&pool, "reader").await;
        let chef = create_test_user(&pool, "chef").await;
        let baker = create_test_user(&pool, "baker").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Subscriptions::new(&mut conn);

        repo.create(reader.id, chef.id).await.unwrap();
        repo.create(reader.id, baker.id).await.unwrap();

        assert_eq!(repo.count_authors(reader.id).await.unwrap(), 2);
        assert_eq!(repo.count_authors(chef.id).await.unwrap(), 0);

        let authors = repo.list_authors(reader.id, 0, 10).await.unwrap();
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].id, baker.id);

        let followed = repo.followed_among(reader.id, &[chef.id, reader.id]).await.unwrap();
        assert_eq!(followed, HashSet::from([chef.id]));

        assert!(repo.delete(reader.id, chef.id).await.unwrap());
        assert!(!repo.delete(reader.id, chef.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_constraints(pool: PgPool) {
        let reader = create_test_user(&pool, "reader").await;
        let chef = create_test_user(&pool, "chef").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Subscriptions::new(&mut conn);

        repo.create(reader.id, chef.id).await.unwrap();
        let dup = repo.create(reader.id, chef.id).await.unwrap_err();
        assert!(dup.is_unique_violation_of(SUBSCRIPTION_UNIQUE));

        let own = repo.create(reader.id, reader.id).await.unwrap_err();
        assert!(own.is_check_violation_of(NO_SELF_FOLLOW));
    }
}

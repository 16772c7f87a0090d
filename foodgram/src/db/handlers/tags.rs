//! Database repository for tags. Tags are read-only through the API.

use crate::db::{errors::Result, models::tags::TagDBResponse};
use crate::types::TagId;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

pub struct Tags<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tags<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<TagDBResponse>> {
        let tags = sqlx::query_as::<_, TagDBResponse>("SELECT id, name, slug FROM tags ORDER BY id")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(tags)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: TagId) -> Result<Option<TagDBResponse>> {
        let tag = sqlx::query_as::<_, TagDBResponse>("SELECT id, name, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(tag)
    }

    /// Which of the given ids exist
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn existing_ids(&mut self, ids: &[TagId]) -> Result<HashSet<TagId>> {
        let found = sqlx::query_scalar::<_, TagId>("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(found.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_seeded_tags(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tags::new(&mut conn);

        let tags = repo.list().await.unwrap();
        let slugs: Vec<&str> = tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["breakfast", "lunch", "dinner"]);

        let lunch = repo.get_by_id(tags[1].id).await.unwrap().unwrap();
        assert_eq!(lunch.name, "Lunch");
        assert!(repo.get_by_id(-1).await.unwrap().is_none());

        let existing = repo.existing_ids(&[tags[0].id, 12_345]).await.unwrap();
        assert_eq!(existing, HashSet::from([tags[0].id]));
    }
}

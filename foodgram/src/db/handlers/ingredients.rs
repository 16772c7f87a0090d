//! Database repository for the ingredient catalogue.

use crate::db::{
    errors::Result,
    models::ingredients::{IngredientCreateDBRequest, IngredientDBResponse},
};
use crate::types::IngredientId;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

/// Filter for listing ingredients
#[derive(Debug, Clone, Default)]
pub struct IngredientFilter {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

/// Escape `LIKE` metacharacters so user input only ever matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub struct Ingredients<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Ingredients<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), fields(name = ?filter.name), err)]
    pub async fn list(&mut self, filter: &IngredientFilter) -> Result<Vec<IngredientDBResponse>> {
        let pattern = filter
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| format!("{}%", escape_like(&name.to_lowercase())));

        let ingredients = sqlx::query_as::<_, IngredientDBResponse>(
            r#"
            SELECT id, name, measurement_unit
            FROM ingredients
            WHERE $1::text IS NULL OR LOWER(name) LIKE $1
            ORDER BY name, measurement_unit
            "#,
        )
        .bind(pattern)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(ingredients)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: IngredientId) -> Result<Option<IngredientDBResponse>> {
        let ingredient =
            sqlx::query_as::<_, IngredientDBResponse>("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(ingredient)
    }

    /// Which of the given ids exist
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn existing_ids(&mut self, ids: &[IngredientId]) -> Result<HashSet<IngredientId>> {
        let found = sqlx::query_scalar::<_, IngredientId>("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(found.into_iter().collect())
    }

    /// Insert a batch, skipping (name, unit) pairs that already exist. Returns the number inserted.
    #[instrument(skip(self, batch), fields(count = batch.len()), err)]
    pub async fn insert_batch(&mut self, batch: &[IngredientCreateDBRequest]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let names: Vec<&str> = batch.iter().map(|i| i.name.as_str()).collect();
        let units: Vec<&str> = batch.iter().map(|i| i.measurement_unit.as_str()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            SELECT * FROM UNNEST($1::text[], $2::text[])
            ON CONFLICT (name, measurement_unit) DO NOTHING
            "#,
        )
        .bind(&names)
        .bind(&units)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Remove the whole catalogue, cascading to recipe lines. Returns the number deleted.
    #[instrument(skip(self), err)]
    pub async fn delete_all(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ingredients").execute(&mut *self.db).await?;
        Ok(result.rows_affected())
    }
}

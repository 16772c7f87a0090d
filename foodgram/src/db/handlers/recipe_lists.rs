//! Database repository for per-user recipe lists: favorites and the shopping cart.
//!
//! Both tables have the same shape (`user_id`, `recipe_id`, unique per pair), so one repository
//! serves both and is parameterised by [`RecipeList`].

use crate::db::errors::Result;
use crate::types::{RecipeId, UserId};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    /// Name of the unique constraint guarding duplicate entries
    pub fn unique_constraint(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites_user_recipe_unique",
            RecipeList::ShoppingCart => "shopping_cart_user_recipe_unique",
        }
    }
}

pub struct RecipeLists<'c> {
    db: &'c mut PgConnection,
    list: RecipeList,
}

impl<'c> RecipeLists<'c> {
    pub fn new(db: &'c mut PgConnection, list: RecipeList) -> Self {
        Self { db, list }
    }

    /// Add a recipe. A duplicate surfaces as a unique violation on [`RecipeList::unique_constraint`].
    #[instrument(skip(self), fields(list = self.list.table()), err)]
    pub async fn add(&mut self, user_id: UserId, recipe_id: RecipeId) -> Result<()> {
        sqlx::query(&format!("INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2)", self.list.table()))
            .bind(user_id)
            .bind(recipe_id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Remove a recipe, returning whether it was present
    #[instrument(skip(self), fields(list = self.list.table()), err)]
    pub async fn remove(&mut self, user_id: UserId, recipe_id: RecipeId) -> Result<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            self.list.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Which of the given recipes are on the user's list
    #[instrument(skip(self, recipe_ids), fields(list = self.list.table(), count = recipe_ids.len()), err)]
    pub async fn contained(&mut self, user_id: UserId, recipe_ids: &[RecipeId]) -> Result<HashSet<RecipeId>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let found = sqlx::query_scalar::<_, RecipeId>(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
            self.list.table()
        ))
        .bind(user_id)
        .bind(recipe_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(found.into_iter().collect())
    }
}

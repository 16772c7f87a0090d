//! Database models for recipes and their ingredient/tag links.

use crate::db::models::tags::TagDBResponse;
use crate::types::{IngredientId, RecipeId, TagId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One ingredient line of a recipe, as written by the author
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeIngredientInput {
    pub ingredient_id: IngredientId,
    pub amount: i32,
}

/// Database request for creating a recipe with its links
#[derive(Debug, Clone)]
pub struct RecipeCreateDBRequest {
    pub author_id: UserId,
    pub name: String,
    pub text: String,
    /// Image path relative to the media root
    pub image: String,
    pub cooking_time: i32,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientInput>,
}

/// Database request for updating a recipe
///
/// Tag and ingredient sets are always replaced wholesale. `image` keeps the stored image when
/// `None`.
#[derive(Debug, Clone)]
pub struct RecipeUpdateDBRequest {
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientInput>,
}

/// A bare `recipes` row
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
}

/// Ingredient joined with the amount used by one recipe
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipeIngredientDBResponse {
    pub recipe_id: RecipeId,
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// A recipe with its tags and ingredient lines
#[derive(Debug, Clone)]
pub struct RecipeDBResponse {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<TagDBResponse>,
    pub ingredients: Vec<RecipeIngredientDBResponse>,
}

impl RecipeDBResponse {
    pub fn from_parts(row: RecipeRow, tags: Vec<TagDBResponse>, ingredients: Vec<RecipeIngredientDBResponse>) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            name: row.name,
            image: row.image,
            text: row.text,
            cooking_time: row.cooking_time,
            created_at: row.created_at,
            tags,
            ingredients,
        }
    }
}

/// One ingredient line of a recipe sitting in a user's shopping cart, before aggregation
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CartIngredientLine {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

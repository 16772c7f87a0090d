//! API request/response models for recipes.

use super::tags::TagResponse;
use super::users::UserResponse;
use super::{bounded_value, push_error, required_field, required_value};
use crate::db::models::recipes::{RecipeDBResponse, RecipeIngredientDBResponse, RecipeIngredientInput, RecipeRow};
use crate::errors::FieldErrors;
use crate::media::MediaStorage;
use crate::types::{IngredientId, RecipeId, TagId, UserId};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use std::collections::HashSet;
use utoipa::{IntoParams, ToSchema};

pub const NAME_MAX_LENGTH: usize = 256;
pub const MIN_VALUE: i64 = 1;
pub const MAX_VALUE: i64 = 32000;

// Recipe request models

// Numbers may also arrive as numeric strings ("25"), which form-based clients send.

/// One ingredient line of a create/update payload
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct IngredientAmount {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub id: Option<IngredientId>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub amount: Option<i64>,
}

/// Body of `POST /recipes/` and `PATCH /recipes/{id}/`
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RecipeWrite {
    pub ingredients: Option<Vec<IngredientAmount>>,
    #[serde_as(as = "Option<Vec<PickFirst<(_, DisplayFromStr)>>>")]
    pub tags: Option<Vec<TagId>>,
    /// `data:image/<type>;base64,<payload>`; required on create, optional on update
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub cooking_time: Option<i64>,
}

/// A recipe payload that passed field validation. References are not checked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<String>,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientInput>,
}

impl RecipeWrite {
    /// Validate fields. `require_image` is true on create.
    pub fn validate(self, require_image: bool) -> Result<ValidRecipe, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required_field(&mut errors, "name", self.name, NAME_MAX_LENGTH);
        let text = required_field(&mut errors, "text", self.text, usize::MAX);
        let cooking_time = required_value(&mut errors, "cooking_time", self.cooking_time)
            .and_then(|value| bounded_value(&mut errors, "cooking_time", value, MIN_VALUE, MAX_VALUE));

        let image = match self.image {
            Some(image) if image.trim().is_empty() => {
                push_error(&mut errors, "image", "No file was submitted.");
                None
            }
            Some(image) => Some(image),
            None => {
                if require_image {
                    push_error(&mut errors, "image", super::REQUIRED);
                }
                None
            }
        };

        let tags = required_value(&mut errors, "tags", self.tags).and_then(|tags| {
            if tags.is_empty() {
                push_error(&mut errors, "tags", "At least one tag is required.");
                return None;
            }
            let unique: HashSet<TagId> = tags.iter().copied().collect();
            if unique.len() != tags.len() {
                push_error(&mut errors, "tags", "Tags must not repeat.");
                return None;
            }
            Some(tags)
        });

        let ingredients =
            required_value(&mut errors, "ingredients", self.ingredients).and_then(|lines| validate_ingredients(&mut errors, lines));

        match (name, text, cooking_time, tags, ingredients) {
            (Some(name), Some(text), Some(cooking_time), Some(tags), Some(ingredients)) if errors.is_empty() => {
                Ok(ValidRecipe {
                    name,
                    text,
                    cooking_time,
                    image,
                    tags,
                    ingredients,
                })
            }
            _ => Err(errors),
        }
    }
}

fn validate_ingredients(errors: &mut FieldErrors, lines: Vec<IngredientAmount>) -> Option<Vec<RecipeIngredientInput>> {
    if lines.is_empty() {
        push_error(errors, "ingredients", "At least one ingredient is required.");
        return None;
    }

    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(ingredient_id) = line.id else {
            push_error(errors, "ingredients", "Each ingredient needs an id.");
            return None;
        };
        let Some(amount) = line.amount else {
            push_error(errors, "ingredients", "Each ingredient needs an amount.");
            return None;
        };
        if !(MIN_VALUE..=MAX_VALUE).contains(&amount) {
            push_error(
                errors,
                "ingredients",
                format!("Ingredient amount must be between {MIN_VALUE} and {MAX_VALUE}."),
            );
            return None;
        }
        if !seen.insert(ingredient_id) {
            push_error(errors, "ingredients", "Ingredients must not repeat.");
            return None;
        }
        valid.push(RecipeIngredientInput {
            ingredient_id,
            amount: amount as i32,
        });
    }

    Some(valid)
}

impl ValidRecipe {
    /// Errors for tag and ingredient ids that do not exist
    pub fn missing_references(&self, existing_tags: &HashSet<TagId>, existing_ingredients: &HashSet<IngredientId>) -> FieldErrors {
        let mut errors = FieldErrors::new();

        for id in self.tags.iter().filter(|id| !existing_tags.contains(id)) {
            push_error(&mut errors, "tags", format!("Invalid pk \"{id}\" - object does not exist."));
        }
        for line in self
            .ingredients
            .iter()
            .filter(|line| !existing_ingredients.contains(&line.ingredient_id))
        {
            push_error(
                &mut errors,
                "ingredients",
                format!("Invalid pk \"{}\" - object does not exist.", line.ingredient_id),
            );
        }

        errors
    }

    pub fn ingredient_ids(&self) -> Vec<IngredientId> {
        self.ingredients.iter().map(|line| line.ingredient_id).collect()
    }
}

/// Query parameters for listing recipes
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct RecipeListQuery {
    /// Only recipes by this author
    pub author: Option<UserId>,
    /// Tag slugs; may repeat, a recipe matches if it has any of them
    #[serde(default)]
    pub tags: Vec<String>,
    /// `1` to show only the caller's favorites
    pub is_favorited: Option<String>,
    /// `1` to show only recipes in the caller's shopping cart
    pub is_in_shopping_cart: Option<String>,
}

fn is_truthy(flag: Option<&str>) -> bool {
    matches!(flag, Some("1" | "true" | "True"))
}

impl RecipeListQuery {
    pub fn favorited_only(&self) -> bool {
        is_truthy(self.is_favorited.as_deref())
    }

    pub fn in_cart_only(&self) -> bool {
        is_truthy(self.is_in_shopping_cart.as_deref())
    }
}

// Recipe response models

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredientResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientDBResponse> for RecipeIngredientResponse {
    fn from(db: RecipeIngredientDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            measurement_unit: db.measurement_unit,
            amount: db.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeResponse {
    pub id: RecipeId,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    /// Absolute image URL
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Flags that depend on the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerFlags {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeResponse {
    pub fn from_db(db: RecipeDBResponse, author: UserResponse, flags: ViewerFlags, media: &MediaStorage) -> Self {
        Self {
            id: db.id,
            tags: db.tags.into_iter().map(TagResponse::from).collect(),
            author,
            ingredients: db.ingredients.into_iter().map(RecipeIngredientResponse::from).collect(),
            is_favorited: flags.is_favorited,
            is_in_shopping_cart: flags.is_in_shopping_cart,
            name: db.name,
            image: media.url(&db.image),
            text: db.text,
            cooking_time: db.cooking_time,
        }
    }
}

/// Compact recipe used in favorites, cart and subscription previews
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipeMinifiedResponse {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeMinifiedResponse {
    pub fn from_row(row: RecipeRow, media: &MediaStorage) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: media.url(&row.image),
            cooking_time: row.cooking_time,
        }
    }

    pub fn from_recipe(recipe: RecipeDBResponse, media: &MediaStorage) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: media.url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShortLinkResponse {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

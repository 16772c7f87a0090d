use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::ingredients::{IngredientResponse, IngredientSearchQuery},
    db::handlers::{Ingredients, ingredients::IngredientFilter},
    errors::{Error, Result},
    types::IngredientId,
};

#[utoipa::path(
    get,
    path = "/ingredients/",
    tag = "ingredients",
    summary = "Search ingredients",
    params(IngredientSearchQuery),
    responses((status = 200, description = "Matching ingredients", body = Vec<IngredientResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientSearchQuery>,
) -> Result<Json<Vec<IngredientResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let filter = IngredientFilter {
        name: query.name.filter(|name| !name.is_empty()),
    };
    let ingredients = Ingredients::new(&mut conn).list(&filter).await?;
    Ok(Json(ingredients.into_iter().map(IngredientResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/ingredients/{id}/",
    tag = "ingredients",
    summary = "Get ingredient",
    params(("id" = IngredientId, Path, description = "Ingredient ID")),
    responses(
        (status = 200, description = "Ingredient", body = IngredientResponse),
        (status = 404, description = "Ingredient not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<IngredientId>,
) -> Result<Json<IngredientResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ingredient = Ingredients::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Ingredient", id))?;
    Ok(Json(IngredientResponse::from(ingredient)))
}

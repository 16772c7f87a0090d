use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, LOCATION},
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use sqlx::PgConnection;
use std::collections::HashSet;

use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination, request_url},
        recipes::{
            RecipeListQuery, RecipeMinifiedResponse, RecipeResponse, RecipeWrite, ShortLinkResponse, ValidRecipe,
            ViewerFlags,
        },
        users::{CurrentUser, UserResponse},
    },
    auth::current_user::is_owner_or_admin,
    db::{
        handlers::{Ingredients, RecipeList, RecipeLists, Recipes, Repository, Subscriptions, Tags, Users, recipes::RecipeFilter},
        models::recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeUpdateDBRequest},
    },
    errors::{Error, Result},
    media::{DecodedImage, MediaDir, MediaStorage},
    short_link,
    shopping_list,
    types::{Operation, RecipeId, UserId},
};

/// Turn recipes into responses, resolving authors and the viewer's flags in bulk
pub(crate) async fn render_recipes(
    conn: &mut PgConnection,
    viewer: Option<&CurrentUser>,
    recipes: Vec<RecipeDBResponse>,
    media: &MediaStorage,
) -> Result<Vec<RecipeResponse>> {
    let recipe_ids: Vec<RecipeId> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<UserId> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors = Users::new(&mut *conn).get_bulk(author_ids.clone()).await?;

    let (followed, favorited, in_cart) = match viewer {
        Some(viewer) => (
            Subscriptions::new(&mut *conn).followed_among(viewer.id, &author_ids).await?,
            RecipeLists::new(&mut *conn, RecipeList::Favorites)
                .contained(viewer.id, &recipe_ids)
                .await?,
            RecipeLists::new(&mut *conn, RecipeList::ShoppingCart)
                .contained(viewer.id, &recipe_ids)
                .await?,
        ),
        None => Default::default(),
    };

    let mut responses = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| Error::Internal {
            operation: format!("load author {} of recipe {}", recipe.author_id, recipe.id),
        })?;
        let author = UserResponse::from_db(author, followed.contains(&recipe.author_id), media);
        let flags = ViewerFlags {
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: in_cart.contains(&recipe.id),
        };
        responses.push(RecipeResponse::from_db(recipe, author, flags, media));
    }

    Ok(responses)
}

async fn render_recipe(
    conn: &mut PgConnection,
    viewer: Option<&CurrentUser>,
    recipe: RecipeDBResponse,
    media: &MediaStorage,
) -> Result<RecipeResponse> {
    let id = recipe.id;
    render_recipes(conn, viewer, vec![recipe], media)
        .await?
        .pop()
        .ok_or_else(|| Error::Internal {
            operation: format!("render recipe {id}"),
        })
}

async fn load_recipe(conn: &mut PgConnection, id: RecipeId) -> Result<RecipeDBResponse> {
    Recipes::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Recipe", id))
}

fn require_owner(user: &CurrentUser, recipe: &RecipeDBResponse, action: Operation) -> Result<()> {
    if is_owner_or_admin(user, recipe.author_id) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            action,
            resource: format!("recipe {}", recipe.id),
        })
    }
}

/// Validate a payload and check that every referenced tag and ingredient exists
async fn validate_payload(conn: &mut PgConnection, payload: RecipeWrite, require_image: bool) -> Result<ValidRecipe> {
    let recipe = payload.validate(require_image).map_err(|errors| Error::Validation { errors })?;

    let existing_tags = Tags::new(&mut *conn).existing_ids(&recipe.tags).await?;
    let existing_ingredients = Ingredients::new(&mut *conn).existing_ids(&recipe.ingredient_ids()).await?;

    let errors = recipe.missing_references(&existing_tags, &existing_ingredients);
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }
    Ok(recipe)
}

/// Decode and store an uploaded recipe image, returning its media path
async fn store_image(media: &MediaStorage, data: &str) -> Result<String> {
    let image = DecodedImage::parse(data).map_err(|e| Error::field("image", e.to_string()))?;
    media.save(&image, MediaDir::RecipeImages).await
}

/// List recipes
#[utoipa::path(
    get,
    path = "/recipes/",
    tag = "recipes",
    summary = "List recipes",
    params(Pagination, RecipeListQuery),
    responses(
        (status = 200, description = "Page of recipes, newest first", body = PaginatedResponse<RecipeResponse>),
        (status = 404, description = "Page out of range"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_recipes(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    viewer: Option<CurrentUser>,
    Query(pagination): Query<Pagination>,
    axum_extra::extract::Query(query): axum_extra::extract::Query<RecipeListQuery>,
) -> Result<Json<PaginatedResponse<RecipeResponse>>> {
    let page = pagination.resolve(&state.config.pagination);
    let viewer_id = viewer.as_ref().map(|v| v.id);

    let filter = RecipeFilter {
        author_id: query.author,
        tag_slugs: query.tags.clone(),
        favorited_by: viewer_id.filter(|_| query.favorited_only()),
        in_cart_of: viewer_id.filter(|_| query.in_cart_only()),
        skip: page.skip(),
        limit: page.limit,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let count = Recipes::new(&mut conn).count(&filter).await?;
    page.ensure_exists(count)?;

    let recipes = Recipes::new(&mut conn).list(&filter).await?;
    let results = render_recipes(&mut conn, viewer.as_ref(), recipes, &state.media).await?;

    Ok(Json(PaginatedResponse::new(
        results,
        count,
        page,
        &request_url(&state.config.public_url, &uri),
    )))
}

/// Create a recipe
#[utoipa::path(
    post,
    path = "/recipes/",
    request_body = RecipeWrite,
    tag = "recipes",
    summary = "Create recipe",
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Field validation errors"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeWrite>, Error>,
) -> Result<(StatusCode, Json<RecipeResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = validate_payload(&mut conn, payload, true).await?;

    let data = recipe.image.as_deref().ok_or_else(|| Error::field("image", "This field is required."))?;
    let image = store_image(&state.media, data).await?;

    let request = RecipeCreateDBRequest {
        author_id: current_user.id,
        name: recipe.name,
        text: recipe.text,
        image: image.clone(),
        cooking_time: recipe.cooking_time,
        tags: recipe.tags,
        ingredients: recipe.ingredients,
    };
    let created = match Recipes::new(&mut conn).create(&request).await {
        Ok(created) => created,
        Err(e) => {
            state.media.remove(&image).await;
            return Err(e.into());
        }
    };

    tracing::info!("User {} created recipe {}", current_user.id, created.id);
    let response = render_recipe(&mut conn, Some(&current_user), created, &state.media).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a recipe
#[utoipa::path(
    get,
    path = "/recipes/{id}/",
    tag = "recipes",
    summary = "Get recipe",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe", body = RecipeResponse),
        (status = 404, description = "Recipe not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    viewer: Option<CurrentUser>,
) -> Result<Json<RecipeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = load_recipe(&mut conn, id).await?;
    Ok(Json(render_recipe(&mut conn, viewer.as_ref(), recipe, &state.media).await?))
}

/// Update a recipe. Tags and ingredients are replaced wholesale; the image is kept unless a new
/// one is uploaded.
#[utoipa::path(
    patch,
    path = "/recipes/{id}/",
    request_body = RecipeWrite,
    tag = "recipes",
    summary = "Update recipe",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 400, description = "Field validation errors"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeWrite>, Error>,
) -> Result<Json<RecipeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let existing = load_recipe(&mut conn, id).await?;
    require_owner(&current_user, &existing, Operation::Update)?;

    let recipe = validate_payload(&mut conn, payload, false).await?;

    // Clients echo the current image URL back when it is unchanged
    let new_image = match recipe.image.as_deref() {
        Some(data) if data.starts_with("data:") => Some(store_image(&state.media, data).await?),
        Some(url) if url == state.media.url(&existing.image) || url == existing.image => None,
        Some(_) => {
            return Err(Error::field(
                "image",
                "Invalid image format. Expected data:image/<type>;base64,<data>",
            ));
        }
        None => None,
    };

    let request = RecipeUpdateDBRequest {
        name: recipe.name,
        text: recipe.text,
        image: new_image.clone(),
        cooking_time: recipe.cooking_time,
        tags: recipe.tags,
        ingredients: recipe.ingredients,
    };
    let updated = match Recipes::new(&mut conn).update(id, &request).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(path) = &new_image {
                state.media.remove(path).await;
            }
            return Err(e.into());
        }
    };
    if new_image.is_some() {
        state.media.remove(&existing.image).await;
    }

    Ok(Json(
        render_recipe(&mut conn, Some(&current_user), updated, &state.media).await?,
    ))
}

/// Delete a recipe
#[utoipa::path(
    delete,
    path = "/recipes/{id}/",
    tag = "recipes",
    summary = "Delete recipe",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let existing = load_recipe(&mut conn, id).await?;
    require_owner(&current_user, &existing, Operation::Delete)?;

    if !Recipes::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Recipe", id));
    }
    state.media.remove(&existing.image).await;

    tracing::info!("User {} deleted recipe {}", current_user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

/// Short link to a recipe
#[utoipa::path(
    get,
    path = "/recipes/{id}/get-link/",
    tag = "recipes",
    summary = "Get short link",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Short link", body = ShortLinkResponse),
        (status = 404, description = "Recipe not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_link(State(state): State<AppState>, Path(id): Path<RecipeId>) -> Result<Json<ShortLinkResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    load_recipe(&mut conn, id).await?;
    Ok(Json(ShortLinkResponse {
        short_link: short_link::link_for(&state.config.public_url, id),
    }))
}

/// Add a recipe to one of the caller's lists
async fn add_to_list(
    state: &AppState,
    user: &CurrentUser,
    id: RecipeId,
    list: RecipeList,
) -> Result<(StatusCode, Json<RecipeMinifiedResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = load_recipe(&mut conn, id).await?;

    RecipeLists::new(&mut conn, list).add(user.id, id).await.map_err(|e| {
        if e.is_unique_violation_of(list.unique_constraint()) {
            Error::Conflict {
                message: match list {
                    RecipeList::Favorites => "Recipe is already in favorites.",
                    RecipeList::ShoppingCart => "Recipe is already in the shopping cart.",
                }
                .to_string(),
            }
        } else {
            Error::Database(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(RecipeMinifiedResponse::from_recipe(recipe, &state.media)),
    ))
}

/// Remove a recipe from one of the caller's lists
async fn remove_from_list(state: &AppState, user: &CurrentUser, id: RecipeId, list: RecipeList) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    load_recipe(&mut conn, id).await?;

    if !RecipeLists::new(&mut conn, list).remove(user.id, id).await? {
        let resource = match list {
            RecipeList::Favorites => "Favorite",
            RecipeList::ShoppingCart => "Shopping cart entry",
        };
        return Err(Error::not_found(resource, id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/recipes/{id}/favorite/",
    tag = "recipes",
    summary = "Add to favorites",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeMinifiedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found"),
        (status = 409, description = "Already in favorites"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_favorite(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<(StatusCode, Json<RecipeMinifiedResponse>)> {
    add_to_list(&state, &current_user, id, RecipeList::Favorites).await
}

#[utoipa::path(
    delete,
    path = "/recipes/{id}/favorite/",
    tag = "recipes",
    summary = "Remove from favorites",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found or not in favorites"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    remove_from_list(&state, &current_user, id, RecipeList::Favorites).await
}

#[utoipa::path(
    post,
    path = "/recipes/{id}/shopping_cart/",
    tag = "recipes",
    summary = "Add to shopping cart",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeMinifiedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found"),
        (status = 409, description = "Already in the shopping cart"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<(StatusCode, Json<RecipeMinifiedResponse>)> {
    add_to_list(&state, &current_user, id, RecipeList::ShoppingCart).await
}

#[utoipa::path(
    delete,
    path = "/recipes/{id}/shopping_cart/",
    tag = "recipes",
    summary = "Remove from shopping cart",
    params(("id" = RecipeId, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found or not in the cart"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    remove_from_list(&state, &current_user, id, RecipeList::ShoppingCart).await
}

/// Download the aggregated shopping list for everything in the cart
#[utoipa::path(
    get,
    path = "/recipes/download_shopping_cart/",
    tag = "recipes",
    summary = "Download shopping list",
    responses(
        (status = 200, description = "Plain text shopping list", body = String, content_type = "text/plain"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn download_shopping_cart(State(state): State<AppState>, current_user: CurrentUser) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lines = Recipes::new(&mut conn).cart_lines(current_user.id).await?;

    let items = shopping_list::aggregate(lines);
    let body = shopping_list::render(&items);

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", shopping_list::FILE_NAME),
            ),
        ],
        body,
    )
        .into_response())
}

/// Resolve a short link to the recipe page. Served outside `/api`, so not part of the API docs.
#[tracing::instrument(skip_all)]
pub async fn resolve_short_link(State(state): State<AppState>, Path(code): Path<String>) -> Result<Response> {
    let id = short_link::decode(&code).ok_or_else(|| Error::not_found("Short link", &code))?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    load_recipe(&mut conn, id).await?;

    Ok((StatusCode::FOUND, [(LOCATION, format!("/recipes/{id}"))]).into_response())
}

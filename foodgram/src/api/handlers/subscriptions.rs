use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination, request_url},
        recipes::RecipeMinifiedResponse,
        users::{CurrentUser, RecipesLimitQuery, UserResponse, UserWithRecipesResponse},
    },
    db::{
        handlers::{Recipes, Repository, Subscriptions, Users, subscriptions::SUBSCRIPTION_UNIQUE},
        models::users::UserDBResponse,
    },
    errors::{Error, Result},
    media::MediaStorage,
    types::UserId,
};

impl RecipesLimitQuery {
    /// The preview size, rejecting negative values
    fn checked(&self) -> Result<Option<i64>> {
        match self.recipes_limit {
            Some(limit) if limit < 0 => Err(Error::field(
                "recipes_limit",
                "Ensure this value is greater than or equal to 0.",
            )),
            limit => Ok(limit),
        }
    }
}

/// Attach recipe previews and counts to followed authors, keeping their order
async fn with_recipes(
    conn: &mut PgConnection,
    authors: Vec<UserDBResponse>,
    recipes_limit: Option<i64>,
    media: &MediaStorage,
) -> Result<Vec<UserWithRecipesResponse>> {
    let author_ids: Vec<UserId> = authors.iter().map(|a| a.id).collect();

    let mut previews = Recipes::new(&mut *conn).previews_for_authors(&author_ids, recipes_limit).await?;
    let counts = Recipes::new(&mut *conn).count_for_authors(&author_ids).await?;

    Ok(authors
        .into_iter()
        .map(|author| {
            let recipes = previews
                .remove(&author.id)
                .unwrap_or_default()
                .into_iter()
                .map(|row| RecipeMinifiedResponse::from_row(row, media))
                .collect();
            let recipes_count = counts.get(&author.id).copied().unwrap_or(0);
            UserWithRecipesResponse {
                user: UserResponse::from_db(author, true, media),
                recipes,
                recipes_count,
            }
        })
        .collect())
}

/// Authors the caller follows
#[utoipa::path(
    get,
    path = "/users/subscriptions/",
    tag = "subscriptions",
    summary = "List subscriptions",
    params(Pagination, RecipesLimitQuery),
    responses(
        (status = 200, description = "Page of followed authors", body = PaginatedResponse<UserWithRecipesResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Page out of range"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
    Query(limit): Query<RecipesLimitQuery>,
) -> Result<Json<PaginatedResponse<UserWithRecipesResponse>>> {
    let recipes_limit = limit.checked()?;
    let page = pagination.resolve(&state.config.pagination);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let count = Subscriptions::new(&mut conn).count_authors(current_user.id).await?;
    page.ensure_exists(count)?;

    let authors = Subscriptions::new(&mut conn)
        .list_authors(current_user.id, page.skip(), page.limit)
        .await?;
    let results = with_recipes(&mut conn, authors, recipes_limit, &state.media).await?;

    Ok(Json(PaginatedResponse::new(
        results,
        count,
        page,
        &request_url(&state.config.public_url, &uri),
    )))
}

/// Follow an author
#[utoipa::path(
    post,
    path = "/users/{id}/subscribe/",
    tag = "subscriptions",
    summary = "Subscribe",
    params(("id" = UserId, Path, description = "Author ID"), RecipesLimitQuery),
    responses(
        (status = 201, description = "Subscribed", body = UserWithRecipesResponse),
        (status = 400, description = "Cannot subscribe to yourself"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Author not found"),
        (status = 409, description = "Already subscribed"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    Path(author_id): Path<UserId>,
    current_user: CurrentUser,
    Query(limit): Query<RecipesLimitQuery>,
) -> Result<(StatusCode, Json<UserWithRecipesResponse>)> {
    let recipes_limit = limit.checked()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let author = Users::new(&mut conn)
        .get_by_id(author_id)
        .await?
        .ok_or_else(|| Error::not_found("User", author_id))?;

    if author.id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot subscribe to yourself.".to_string(),
        });
    }

    Subscriptions::new(&mut conn)
        .create(current_user.id, author.id)
        .await
        .map_err(|e| {
            if e.is_unique_violation_of(SUBSCRIPTION_UNIQUE) {
                Error::Conflict {
                    message: "You are already subscribed to this author.".to_string(),
                }
            } else {
                Error::Database(e)
            }
        })?;

    let mut response = with_recipes(&mut conn, vec![author], recipes_limit, &state.media).await?;
    let response = response.pop().ok_or_else(|| Error::Internal {
        operation: format!("build subscription response for author {author_id}"),
    })?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Stop following an author
#[utoipa::path(
    delete,
    path = "/users/{id}/subscribe/",
    tag = "subscriptions",
    summary = "Unsubscribe",
    params(("id" = UserId, Path, description = "Author ID")),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Author not found or not subscribed"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(author_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut conn).get_by_id(author_id).await?.is_none() {
        return Err(Error::not_found("User", author_id));
    }

    if !Subscriptions::new(&mut conn).delete(current_user.id, author_id).await? {
        return Err(Error::not_found("Subscription", author_id));
    }

    Ok(StatusCode::NO_CONTENT)
}

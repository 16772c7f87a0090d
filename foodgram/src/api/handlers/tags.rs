use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::tags::TagResponse,
    db::handlers::Tags,
    errors::{Error, Result},
    types::TagId,
};

#[utoipa::path(
    get,
    path = "/tags/",
    tag = "tags",
    summary = "List tags",
    responses((status = 200, description = "All tags", body = Vec<TagResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tags = Tags::new(&mut conn).list().await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/tags/{id}/",
    tag = "tags",
    summary = "Get tag",
    params(("id" = TagId, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag", body = TagResponse),
        (status = 404, description = "Tag not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<TagId>) -> Result<Json<TagResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = Tags::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Tag", id))?;
    Ok(Json(TagResponse::from(tag)))
}

use crate::db::models::tags::TagDBResponse;
use crate::types::TagId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    pub id: TagId,
    pub name: String,
    pub slug: String,
}

impl From<TagDBResponse> for TagResponse {
    fn from(db: TagDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            slug: db.slug,
        }
    }
}

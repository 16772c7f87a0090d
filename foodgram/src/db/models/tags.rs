use crate::types::TagId;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TagDBResponse {
    pub id: TagId,
    pub name: String,
    pub slug: String,
}

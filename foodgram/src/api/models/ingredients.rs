use crate::db::models::ingredients::IngredientDBResponse;
use crate::types::IngredientId;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngredientResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

impl From<IngredientDBResponse> for IngredientResponse {
    fn from(db: IngredientDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            measurement_unit: db.measurement_unit,
        }
    }
}

/// Query parameters for searching ingredients
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct IngredientSearchQuery {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

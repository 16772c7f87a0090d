use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Token login payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Send back as `Authorization: Token <auth_token>`
    pub auth_token: String,
}

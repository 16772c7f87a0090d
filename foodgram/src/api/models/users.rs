//! API request/response models for users and subscriptions.

use super::recipes::RecipeMinifiedResponse;
use super::{required_field, required_value};
use crate::db::models::users::UserDBResponse;
use crate::errors::FieldErrors;
use crate::media::MediaStorage;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const NAME_MAX_LENGTH: usize = 150;

/// The authenticated caller, resolved from the `Authorization` header
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    /// Digest of the token used for this request, so logout can revoke exactly that token
    #[serde(skip)]
    pub token_hash: String,
}

impl CurrentUser {
    pub fn from_db(user: UserDBResponse, token_hash: String) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            is_admin: user.is_admin,
            token_hash,
        }
    }
}

// User request models

/// Registration payload. Every field is required; missing ones are reported per field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Registration payload after field validation (password policy is checked separately)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidUserCreate {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn is_valid_username(username: &str) -> bool {
    username.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

impl UserCreate {
    /// Check required fields, lengths and formats
    pub fn validate(self) -> Result<ValidUserCreate, FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = required_field(&mut errors, "email", self.email, EMAIL_MAX_LENGTH);
        let username = required_field(&mut errors, "username", self.username, NAME_MAX_LENGTH);
        let first_name = required_field(&mut errors, "first_name", self.first_name, NAME_MAX_LENGTH);
        let last_name = required_field(&mut errors, "last_name", self.last_name, NAME_MAX_LENGTH);
        let password = required_value(&mut errors, "password", self.password);

        if email.as_deref().is_some_and(|email| !is_valid_email(email)) {
            errors
                .entry("email".to_string())
                .or_default()
                .push("Enter a valid email address.".to_string());
        }
        if username.as_deref().is_some_and(|username| !is_valid_username(username)) {
            errors.entry("username".to_string()).or_default().push(
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                    .to_string(),
            );
        }

        match (email, username, first_name, last_name, password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) if errors.is_empty() => {
                Ok(ValidUserCreate {
                    email,
                    username,
                    first_name,
                    last_name,
                    password,
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AvatarRequest {
    /// `data:image/<type>;base64,<payload>`
    pub avatar: Option<String>,
}

// User response models

/// Returned by registration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreateResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<UserDBResponse> for UserCreateResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            email: db.email,
            id: db.id,
            username: db.username,
            first_name: db.first_name,
            last_name: db.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the caller follows this user; always false for anonymous callers
    pub is_subscribed: bool,
    /// Absolute avatar URL
    pub avatar: Option<String>,
}

impl UserResponse {
    pub fn from_db(db: UserDBResponse, is_subscribed: bool, media: &MediaStorage) -> Self {
        Self {
            email: db.email,
            id: db.id,
            username: db.username,
            first_name: db.first_name,
            last_name: db.last_name,
            is_subscribed,
            avatar: db.avatar.as_deref().map(|path| media.url(path)),
        }
    }

    pub fn from_current(user: &CurrentUser, media: &MediaStorage) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed: false,
            avatar: user.avatar.as_deref().map(|path| media.url(path)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvatarResponse {
    pub avatar: String,
}

/// An author the caller follows, with a preview of their newest recipes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserWithRecipesResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeMinifiedResponse>,
    pub recipes_count: i64,
}

/// Query parameters for subscription endpoints
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct RecipesLimitQuery {
    /// Maximum number of recipes in each author's preview
    #[param(minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub recipes_limit: Option<i64>,
}

//! OpenAPI documentation for the REST API served under `/api`.
//!
//! The interactive reference is mounted at `/api/docs` and the raw document at
//! `/api/docs/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Token authentication: `Authorization: Token <key>`
struct TokenSecurityAddon;

impl Modify for TokenSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "TokenAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token authentication. Obtain a key from `POST /api/auth/token/login/` and send it as:\n\n\
                     ```\nAuthorization: Token YOUR_KEY\n```\n\n\
                     `Bearer YOUR_KEY` is accepted too.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Foodgram API", description = "Recipes, favorites, subscriptions and shopping lists."),
    servers(
        (url = "/api", description = "Foodgram REST API")
    ),
    modifiers(&TokenSecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::users::register,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::get_me,
        api::handlers::users::set_password,
        api::handlers::users::put_avatar,
        api::handlers::users::delete_avatar,
        api::handlers::subscriptions::list_subscriptions,
        api::handlers::subscriptions::subscribe,
        api::handlers::subscriptions::unsubscribe,
        api::handlers::tags::list_tags,
        api::handlers::tags::get_tag,
        api::handlers::ingredients::list_ingredients,
        api::handlers::ingredients::get_ingredient,
        api::handlers::recipes::list_recipes,
        api::handlers::recipes::create_recipe,
        api::handlers::recipes::get_recipe,
        api::handlers::recipes::update_recipe,
        api::handlers::recipes::delete_recipe,
        api::handlers::recipes::get_link,
        api::handlers::recipes::add_favorite,
        api::handlers::recipes::remove_favorite,
        api::handlers::recipes::add_to_cart,
        api::handlers::recipes::remove_from_cart,
        api::handlers::recipes::download_shopping_cart,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::TokenResponse,
            api::models::users::UserCreate,
            api::models::users::UserCreateResponse,
            api::models::users::UserResponse,
            api::models::users::SetPasswordRequest,
            api::models::users::AvatarRequest,
            api::models::users::AvatarResponse,
            api::models::users::UserWithRecipesResponse,
            api::models::tags::TagResponse,
            api::models::ingredients::IngredientResponse,
            api::models::recipes::IngredientAmount,
            api::models::recipes::RecipeWrite,
            api::models::recipes::RecipeIngredientResponse,
            api::models::recipes::RecipeResponse,
            api::models::recipes::RecipeMinifiedResponse,
            api::models::recipes::ShortLinkResponse,
        )
    ),
    tags(
        (name = "auth", description = "Obtain and revoke auth tokens."),
        (name = "users", description = "Registration, profiles, avatars and password changes."),
        (name = "subscriptions", description = "Follow authors and list the authors you follow, with a preview of their recipes."),
        (name = "tags", description = "Fixed set of recipe tags."),
        (name = "ingredients", description = "Ingredient catalogue with case-insensitive prefix search."),
        (name = "recipes", description = "Recipes, favorites, the shopping cart and short links.

The shopping list download sums amounts of the same ingredient across every recipe in the cart."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/auth/token/login/",
            "/users/",
            "/users/me/avatar/",
            "/users/{id}/subscribe/",
            "/recipes/{id}/shopping_cart/",
            "/recipes/download_shopping_cart/",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }

        let components = doc.components.expect("components are generated");
        assert!(components.security_schemes.contains_key("TokenAuth"));
    }
}

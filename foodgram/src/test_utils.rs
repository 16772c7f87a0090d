//! Test utilities for integration testing.

use crate::{
    AppState, Application,
    auth::password::{self, Argon2Params},
    config::{Config, PasswordConfig},
    crypto::{generate_auth_token, token_digest},
    db::{
        handlers::{AuthTokens, Ingredients, Recipes, Repository, Tags, Users},
        models::{
            ingredients::{IngredientCreateDBRequest, IngredientDBResponse},
            recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeIngredientInput},
            tags::TagDBResponse,
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    media::MediaStorage,
    types::UserId,
};
use axum_test::TestServer;
use sqlx::PgPool;

/// Password every test user is created with
pub const TEST_PASSWORD: &str = "Sup3r-secret-pa55";

/// 1x1 transparent PNG
pub const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub fn create_test_config() -> Config {
    let media_root = tempfile::tempdir().expect("Failed to create media dir").keep();

    Config {
        secret_key: Some("test-secret-key".to_string()),
        media_root,
        admin_email: None,
        admin_password: None,
        password: PasswordConfig {
            // Fast hashing for tests
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn create_test_state(pool: PgPool) -> AppState {
    let config = create_test_config();
    AppState::builder()
        .db(pool)
        .media(MediaStorage::from_config(&config))
        .config(config)
        .build()
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();
    let app = Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

async fn insert_user(pool: &PgPool, username: &str, is_admin: bool) -> UserDBResponse {
    let params = Argon2Params::from(&create_test_config().password);
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, Some(params)).expect("Failed to hash password");

    let mut conn = pool.acquire().await.expect("Failed to acquire database connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: username.to_string(),
            password_hash,
            is_admin,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_user(pool: &PgPool, username: &str) -> UserDBResponse {
    insert_user(pool, username, false).await
}

pub async fn create_test_admin_user(pool: &PgPool, username: &str) -> UserDBResponse {
    insert_user(pool, username, true).await
}

/// Issue an auth token for `user_id`, returning the raw key
pub async fn issue_token(state: &AppState, user_id: UserId) -> String {
    let token = generate_auth_token();
    let mut conn = state.db.acquire().await.expect("Failed to acquire database connection");
    AuthTokens::new(&mut conn)
        .create(user_id, &token_digest(state.config.token_key(), &token))
        .await
        .expect("Failed to create auth token");
    token
}

/// `Authorization` header value for `user_id`, valid for apps built by [`create_test_app`]
pub async fn token_header(pool: &PgPool, user_id: UserId) -> String {
    let state = create_test_state(pool.clone());
    format!("Token {}", issue_token(&state, user_id).await)
}

/// Insert ingredients, returning them in the order given
pub async fn create_test_ingredients(pool: &PgPool, items: &[(&str, &str)]) -> Vec<IngredientDBResponse> {
    let batch: Vec<IngredientCreateDBRequest> = items
        .iter()
        .map(|(name, unit)| IngredientCreateDBRequest {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        })
        .collect();

    let mut conn = pool.acquire().await.expect("Failed to acquire database connection");
    Ingredients::new(&mut conn)
        .insert_batch(&batch)
        .await
        .expect("Failed to insert ingredients");

    let mut created = Vec::with_capacity(items.len());
    for (name, unit) in items {
        let ingredient = sqlx::query_as::<_, IngredientDBResponse>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE name = $1 AND measurement_unit = $2",
        )
        .bind(name)
        .bind(unit)
        .fetch_one(&mut *conn)
        .await
        .expect("Failed to fetch ingredient");
        created.push(ingredient);
    }
    created
}

/// Tags created by the migrations, in id order
pub async fn seeded_tags(pool: &PgPool) -> Vec<TagDBResponse> {
    let mut conn = pool.acquire().await.expect("Failed to acquire database connection");
    Tags::new(&mut conn).list().await.expect("Failed to list tags")
}

/// A recipe with the first seeded tag and 100 g of salt
pub async fn create_test_recipe(pool: &PgPool, author_id: UserId, name: &str) -> RecipeDBResponse {
    let tags = seeded_tags(pool).await;
    let salt = create_test_ingredients(pool, &[("salt", "g")]).await;

    let mut conn = pool.acquire().await.expect("Failed to acquire database connection");
    Recipes::new(&mut conn)
        .create(&RecipeCreateDBRequest {
            author_id,
            name: name.to_string(),
            text: format!("How to cook {name}."),
            image: "recipes/images/test.png".to_string(),
            cooking_time: 30,
            tags: vec![tags[0].id],
            ingredients: vec![RecipeIngredientInput {
                ingredient_id: salt[0].id,
                amount: 100,
            }],
        })
        .await
        .expect("Failed to create test recipe")
}

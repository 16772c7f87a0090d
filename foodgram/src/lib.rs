//! # foodgram: Recipe Sharing Backend
//!
//! `foodgram` is the backend of a recipe-sharing site. Users register, publish recipes made of
//! tagged ingredient lists, follow other authors, keep favorites and build a shopping cart that is
//! downloaded as one summed shopping list.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Every request acquires its own pooled connection; writes
//! that touch several tables run in one transaction. There is no shared mutable in-process state.
//!
//! ### Request Flow
//!
//! A request passes the tracing, CORS, allowed-host and body-limit layers, then reaches an
//! axum handler. Handlers that need a caller take the [`api::models::users::CurrentUser`]
//! extractor, which resolves `Authorization: Token <key>` against the stored token digests.
//! Ownership checks happen in the handler, data access goes through the repositories in
//! [`db::handlers`], and the result is serialized with serde.
//!
//! ### Core Components
//!
//! - [`api`]: request/response models and axum handlers, mounted under `/api`
//! - [`auth`]: password hashing, the token extractor and the allowed-hosts middleware
//! - [`db`]: repositories over `sqlx` and the row types they return
//! - [`media`]: base64 image decoding and the on-disk media store served at `/media`
//! - [`shopping_list`]: aggregation and rendering of the shopping cart download
//! - [`ingredients_import`]: the fixture loader behind the `load-ingredients` binary
//!
//! ## Getting Started
//!
//! ```no_run
//! use foodgram::{Application, Config};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let app = Application::new(config).await?;
//! app.serve(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod ingredients_import;
pub mod media;
mod openapi;
pub mod shopping_list;
pub mod short_link;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::{
        middleware::allowed_hosts_middleware,
        password::{self, Argon2Params},
    },
    config::{CorsOrigin, PasswordConfig},
    db::handlers::{Repository, Users},
    db::models::users::UserCreateDBRequest,
    media::MediaStorage,
    openapi::ApiDoc,
};
use anyhow::Context;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{IngredientId, RecipeId, TagId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .media(MediaStorage::from_config(&config))
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub media: MediaStorage,
}

/// Get the foodgram database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: an existing account with this email gets the password reset and is promoted to
/// administrator. The email doubles as the username.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    email: &str,
    password: &str,
    password_config: &PasswordConfig,
    db: &PgPool,
) -> anyhow::Result<UserId> {
    let password_hash = password::hash_string_with_params(password, Some(Argon2Params::from(password_config)))
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo.get_user_by_email(email).await? {
        sqlx::query("UPDATE users SET password_hash = $1, is_admin = TRUE WHERE id = $2")
            .bind(&password_hash)
            .bind(existing_user.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!("Admin user {} already exists, password refreshed", email);
        return Ok(existing_user.id);
    }

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            username: email.to_string(),
            first_name: "Admin".to_string(),
            last_name: String::new(),
            password_hash,
            is_admin: true,
        })
        .await?;

    tx.commit().await?;
    info!("Created admin user {}", email);
    Ok(created_user.id)
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![header::CONTENT_DISPOSITION, header::LOCATION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// JSON 404 for unknown paths under `/api`, so API clients never receive the SPA shell
async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"detail": "Not found."})))
}

/// Build the main application router with all endpoints and middleware.
///
/// - `/api/*`: the JSON API, with its OpenAPI reference at `/api/docs`
/// - `/s/{code}`: short link redirects
/// - `/media/*`: uploaded images
/// - `/healthz`: liveness probe, answered for any Host
/// - everything else: the front-end from `static_dir` when configured
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, ingredients, recipes, subscriptions, tags, users};

    let api_routes = Router::new()
        // Auth
        .route("/auth/token/login/", post(auth::login))
        .route("/auth/token/logout/", post(auth::logout))
        // Users
        .route("/users/", get(users::list_users).post(users::register))
        .route("/users/me/", get(users::get_me))
        .route("/users/me/avatar/", put(users::put_avatar).delete(users::delete_avatar))
        .route("/users/set_password/", post(users::set_password))
        .route("/users/subscriptions/", get(subscriptions::list_subscriptions))
        .route("/users/{id}/", get(users::get_user))
        .route(
            "/users/{id}/subscribe/",
            post(subscriptions::subscribe).delete(subscriptions::unsubscribe),
        )
        // Catalogue
        .route("/tags/", get(tags::list_tags))
        .route("/tags/{id}/", get(tags::get_tag))
        .route("/ingredients/", get(ingredients::list_ingredients))
        .route("/ingredients/{id}/", get(ingredients::get_ingredient))
        // Recipes
        .route("/recipes/", get(recipes::list_recipes).post(recipes::create_recipe))
        .route("/recipes/download_shopping_cart/", get(recipes::download_shopping_cart))
        .route(
            "/recipes/{id}/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/recipes/{id}/get-link/", get(recipes::get_link))
        .route(
            "/recipes/{id}/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/recipes/{id}/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        // Docs
        .route("/docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .fallback(api_not_found)
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/s/{code}", get(recipes::resolve_short_link))
        .with_state(state.clone())
        .nest("/api", api_routes)
        .nest_service("/media", ServeDir::new(state.media.root()));

    if let Some(static_dir) = &state.config.static_dir {
        // Client-side routes fall back to the SPA entry point
        let spa = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));
        router = router.fallback_service(spa);
    }

    let router = router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(create_cors_layer(&state.config)?)
            .layer(from_fn_with_state(state.clone(), allowed_hosts_middleware))
            .layer(DefaultBodyLimit::max(state.config.max_body_bytes)),
    );

    // Probes address the pod by IP, so the health check sits outside the host check
    Ok(Router::new().route("/healthz", get(|| async { "OK" })).merge(router))
}

/// Main application struct that owns the router and the database pool.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and ensures the
///    configured admin account exists
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish and the pool is closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool (used by tests), or connect when `None`
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting foodgram with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => db::connect_with_retry(&config.database).await?,
        };

        migrator().run(&pool).await.context("Failed to run database migrations")?;

        if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
            create_initial_admin_user(email, password, &config.password, &pool).await?;
        }

        tokio::fs::create_dir_all(&config.media_root)
            .await
            .with_context(|| format!("Failed to create media root {}", config.media_root.display()))?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .media(MediaStorage::from_config(&config))
            .config(config.clone())
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Foodgram listening on http://{}, available at {}", bind_addr, self.config.public_url);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config, create_test_user};
    use axum_test::TestServer;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_is_idempotent(pool: PgPool) {
        let config = create_test_config();

        let first = create_initial_admin_user("admin@example.com", "first-Passw0rd", &config.password, &pool)
            .await
            .unwrap();
        let second = create_initial_admin_user("admin@example.com", "second-Passw0rd", &config.password, &pool)
            .await
            .unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let admin = Users::new(&mut conn).get_by_id(first).await.unwrap().unwrap();
        assert!(admin.is_admin);
        assert_eq!(admin.username, "admin@example.com");
        assert!(password::verify_string("second-Passw0rd", &admin.password_hash).unwrap());
        assert!(!password::verify_string("first-Passw0rd", &admin.password_hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_existing_user_is_promoted(pool: PgPool) {
        let user = create_test_user(&pool, "cook").await;
        let config = create_test_config();

        let id = create_initial_admin_user("cook@example.com", "new-Passw0rd", &config.password, &pool)
            .await
            .unwrap();
        assert_eq!(id, user.id);

        let mut conn = pool.acquire().await.unwrap();
        assert!(Users::new(&mut conn).get_by_id(id).await.unwrap().unwrap().is_admin);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz_and_api_fallback(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");

        let response = app.get("/api/nothing-here/").await;
        response.assert_status_not_found();
        response.assert_json(&serde_json::json!({"detail": "Not found."}));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_openapi_document_is_served(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.get("/api/docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/recipes/"].is_object());
        assert!(doc["components"]["securitySchemes"]["TokenAuth"].is_object());

        app.get("/api/docs").await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_media_and_spa_are_served(pool: PgPool) {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<html>foodgram</html>").unwrap();

        let mut config = create_test_config();
        config.static_dir = Some(static_dir.path().to_path_buf());
        std::fs::create_dir_all(config.media_root.join("recipes/images")).unwrap();
        std::fs::write(config.media_root.join("recipes/images/a.txt"), "image bytes").unwrap();

        let app = Application::new_with_pool(config, Some(pool)).await.unwrap();
        let server: TestServer = app.into_test_server();

        let response = server.get("/media/recipes/images/a.txt").await;
        response.assert_status_ok();
        response.assert_text("image bytes");

        // Client-side route
        let response = server.get("/recipes/42").await;
        response.assert_status_ok();
        response.assert_text("<html>foodgram</html>");

        // API paths never fall through to the SPA
        server.get("/api/unknown/").await.assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rejects_unknown_host(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.get("/api/tags/").add_header("host", "evil.example.org").await;
        response.assert_status_bad_request();

        app.get("/api/tags/").add_header("host", "localhost:8000").await.assert_status_ok();

        // Health checks answer regardless of Host
        let response = app.get("/healthz").add_header("host", "10.0.3.17:8000").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }
}

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, TokenResponse},
        users::CurrentUser,
    },
    auth::password,
    crypto::{generate_auth_token, token_digest},
    db::handlers::{AuthTokens, Users},
    errors::{Error, FieldErrors, NON_FIELD_ERRORS, Result},
};

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Exchange email and password for an auth token
#[utoipa::path(
    post,
    path = "/auth/token/login/",
    request_body = LoginRequest,
    tag = "auth",
    summary = "Obtain auth token",
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Missing fields or invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, Error>,
) -> Result<Json<TokenResponse>> {
    let (email, password) = match (request.email, request.password) {
        (Some(email), Some(password)) => (email, password),
        (email, password) => {
            let mut errors = FieldErrors::new();
            if email.is_none() {
                errors.insert("email".to_string(), vec!["This field is required.".to_string()]);
            }
            if password.is_none() {
                errors.insert("password".to_string(), vec!["This field is required.".to_string()]);
            }
            return Err(Error::Validation { errors });
        }
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_user_by_email(email.trim())
        .await?
        .ok_or_else(|| Error::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS))?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let hash = user.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
    }

    let token = generate_auth_token();
    AuthTokens::new(&mut conn)
        .create(user.id, &token_digest(state.config.token_key(), &token))
        .await?;

    tracing::info!("User {} logged in", user.id);
    Ok(Json(TokenResponse { auth_token: token }))
}

/// Revoke the token used for this request
#[utoipa::path(
    post,
    path = "/auth/token/logout/",
    tag = "auth",
    summary = "Revoke auth token",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    AuthTokens::new(&mut conn).delete_by_hash(&current_user.token_hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::TokenResponse;
    use crate::test_utils::{TEST_PASSWORD, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_and_logout(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, "julia").await;

        let response = app
            .post("/api/auth/token/login/")
            .json(&json!({"email": user.email, "password": TEST_PASSWORD}))
            .await;
        response.assert_status_ok();
        let token = response.json::<TokenResponse>().auth_token;

        let response = app
            .get("/api/users/me/")
            .add_header("authorization", format!("Token {token}"))
            .await;
        response.assert_status_ok();

        let response = app
            .post("/api/auth/token/logout/")
            .add_header("authorization", format!("Token {token}"))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        // The revoked token no longer authenticates
        let response = app
            .get("/api/users/me/")
            .add_header("authorization", format!("Token {token}"))
            .await;
        response.assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_rejects_bad_credentials(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, "julia").await;

        for body in [
            json!({"email": user.email, "password": "wrong-password"}),
            json!({"email": "nobody@example.com", "password": TEST_PASSWORD}),
        ] {
            let response = app.post("/api/auth/token/login/").json(&body).await;
            response.assert_status_bad_request();
            response.assert_json(&json!({
                "non_field_errors": ["Unable to log in with provided credentials."]
            }));
        }

        let response = app.post("/api/auth/token/login/").json(&json!({})).await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(body.get("email").is_some());
        assert!(body.get("password").is_some());

        // Wrongly typed bodies get JSON field errors too
        let response = app
            .post("/api/auth/token/login/")
            .json(&json!({"email": 5, "password": TEST_PASSWORD}))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(body.get("email").is_some());

        let response = app.post("/api/auth/token/login/").json(&json!("julia")).await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(body.get("non_field_errors").is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_logout_requires_token(pool: PgPool) {
        let app = create_test_app(pool).await;
        app.post("/api/auth/token/logout/").await.assert_status_unauthorized();
    }
}

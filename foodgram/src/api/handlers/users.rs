use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination, request_url},
        users::{
            AvatarRequest, AvatarResponse, CurrentUser, SetPasswordRequest, UserCreate, UserCreateResponse, UserResponse,
        },
    },
    auth::password::{self, Argon2Params},
    db::{
        errors::DbError,
        handlers::{Repository, Subscriptions, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, FieldErrors, Result},
    media::{DecodedImage, MediaDir},
    types::UserId,
};

const EMAIL_TAKEN: &str = "A user with that email already exists.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Hash a password with the configured argon2 parameters, off the async runtime
pub(crate) async fn hash_password(state: &AppState, password: String) -> Result<String> {
    let params = Argon2Params::from(&state.config.password);
    tokio::task::spawn_blocking(move || password::hash_string_with_params(&password, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Turn a lost race on the users unique constraints into the same field error a pre-check gives
fn registration_conflict(err: DbError) -> Error {
    if err.is_unique_violation_of("users_email_unique") {
        Error::field("email", EMAIL_TAKEN)
    } else if err.is_unique_violation_of("users_username_unique") {
        Error::field("username", USERNAME_TAKEN)
    } else {
        Error::Database(err)
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/users/",
    request_body = UserCreate,
    tag = "users",
    summary = "Register user",
    responses(
        (status = 201, description = "User registered", body = UserCreateResponse),
        (status = 400, description = "Field validation errors"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<UserCreate>, Error>,
) -> Result<(StatusCode, Json<UserCreateResponse>)> {
    let request = request.validate().map_err(|errors| Error::Validation { errors })?;

    let mut errors = FieldErrors::new();
    let problems = password::check_policy(
        &request.password,
        &state.config.password,
        &[&request.username, &request.email, &request.first_name, &request.last_name],
    );
    if !problems.is_empty() {
        errors.insert("password".to_string(), problems);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let (email_taken, username_taken) = Users::new(&mut conn).find_conflicts(&request.email, &request.username).await?;
    if email_taken {
        errors.insert("email".to_string(), vec![EMAIL_TAKEN.to_string()]);
    }
    if username_taken {
        errors.insert("username".to_string(), vec![USERNAME_TAKEN.to_string()]);
    }
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let password_hash = hash_password(&state, request.password).await?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: request.email,
            username: request.username,
            first_name: request.first_name,
            last_name: request.last_name,
            password_hash,
            is_admin: false,
        })
        .await
        .map_err(registration_conflict)?;

    tracing::info!("Registered user {} ({})", user.id, user.username);
    Ok((StatusCode::CREATED, Json(UserCreateResponse::from(user))))
}

/// List users
#[utoipa::path(
    get,
    path = "/users/",
    tag = "users",
    summary = "List users",
    params(Pagination),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
        (status = 404, description = "Page out of range"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    viewer: Option<CurrentUser>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let page = pagination.resolve(&state.config.pagination);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let count = Users::new(&mut conn).count().await?;
    page.ensure_exists(count)?;

    let users = Users::new(&mut conn).list(&UserFilter::new(page.skip(), page.limit)).await?;

    let followed = match &viewer {
        Some(viewer) => {
            let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
            Subscriptions::new(&mut conn).followed_among(viewer.id, &ids).await?
        }
        None => Default::default(),
    };

    let results = users
        .into_iter()
        .map(|user| {
            let is_subscribed = followed.contains(&user.id);
            UserResponse::from_db(user, is_subscribed, &state.media)
        })
        .collect();

    Ok(Json(PaginatedResponse::new(
        results,
        count,
        page,
        &request_url(&state.config.public_url, &uri),
    )))
}

/// Get a user profile
#[utoipa::path(
    get,
    path = "/users/{id}/",
    tag = "users",
    summary = "Get user",
    params(("id" = UserId, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    viewer: Option<CurrentUser>,
) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("User", id))?;

    let is_subscribed = match &viewer {
        Some(viewer) => Subscriptions::new(&mut conn).followed_among(viewer.id, &[id]).await?.contains(&id),
        None => false,
    };

    Ok(Json(UserResponse::from_db(user, is_subscribed, &state.media)))
}

/// Profile of the caller
#[utoipa::path(
    get,
    path = "/users/me/",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    Ok(Json(UserResponse::from_current(&current_user, &state.media)))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/users/set_password/",
    request_body = SetPasswordRequest,
    tag = "users",
    summary = "Set password",
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new password"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    WithRejection(Json(request), _): WithRejection<Json<SetPasswordRequest>, Error>,
) -> Result<StatusCode> {
    let (new_password, current_password) = match (request.new_password, request.current_password) {
        (Some(new_password), Some(current_password)) => (new_password, current_password),
        (new_password, current_password) => {
            let mut errors = FieldErrors::new();
            if new_password.is_none() {
                errors.insert("new_password".to_string(), vec!["This field is required.".to_string()]);
            }
            if current_password.is_none() {
                errors.insert("current_password".to_string(), vec!["This field is required.".to_string()]);
            }
            return Err(Error::Validation { errors });
        }
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User", current_user.id))?;

    let hash = user.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&current_password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;
    if !is_valid {
        return Err(Error::field("current_password", "Invalid password."));
    }

    let problems = password::check_policy(
        &new_password,
        &state.config.password,
        &[&user.username, &user.email, &user.first_name, &user.last_name],
    );
    if !problems.is_empty() {
        let mut errors = FieldErrors::new();
        errors.insert("new_password".to_string(), problems);
        return Err(Error::Validation { errors });
    }

    let password_hash = hash_password(&state, new_password).await?;
    Users::new(&mut conn)
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Upload or replace the caller's avatar
#[utoipa::path(
    put,
    path = "/users/me/avatar/",
    request_body = AvatarRequest,
    tag = "users",
    summary = "Set avatar",
    responses(
        (status = 200, description = "Avatar stored", body = AvatarResponse),
        (status = 400, description = "Missing or invalid image"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn put_avatar(
    State(state): State<AppState>,
    current_user: CurrentUser,
    WithRejection(Json(request), _): WithRejection<Json<AvatarRequest>, Error>,
) -> Result<Json<AvatarResponse>> {
    let data = request
        .avatar
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| Error::field("avatar", "This field is required."))?;
    let image = DecodedImage::parse(&data).map_err(|e| Error::field("avatar", e.to_string()))?;

    let path = state.media.save(&image, MediaDir::Avatars).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Users::new(&mut conn)
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                avatar: Some(Some(path.clone())),
                ..Default::default()
            },
        )
        .await;
    if let Err(e) = updated {
        state.media.remove(&path).await;
        return Err(e.into());
    }

    if let Some(previous) = current_user.avatar.as_deref() {
        state.media.remove(previous).await;
    }

    Ok(Json(AvatarResponse {
        avatar: state.media.url(&path),
    }))
}

/// Remove the caller's avatar
#[utoipa::path(
    delete,
    path = "/users/me/avatar/",
    tag = "users",
    summary = "Delete avatar",
    responses(
        (status = 204, description = "Avatar removed"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_avatar(State(state): State<AppState>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut conn)
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                avatar: Some(None),
                ..Default::default()
            },
        )
        .await?;

    if let Some(previous) = current_user.avatar.as_deref() {
        state.media.remove(previous).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::users::{AvatarResponse, UserCreateResponse, UserResponse};
    use crate::db::handlers::{Repository, Users};
    use crate::test_utils::{PNG_DATA_URI, TEST_PASSWORD, create_test_app, create_test_user, token_header};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    fn registration() -> serde_json::Value {
        json!({
            "email": "vpupkin@yandex.ru",
            "username": "vasya.pupkin",
            "first_name": "Vasya",
            "last_name": "Pupkin",
            "password": "Qwerty-2024!"
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_user(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app.post("/api/users/").json(&registration()).await;
        response.assert_status(StatusCode::CREATED);
        let created: UserCreateResponse = response.json();
        assert_eq!(created.username, "vasya.pupkin");

        let body: serde_json::Value = response.json();
        assert!(body.get("password").is_none());

        // The stored password is a hash, not the plain text
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).get_by_id(created.id).await.unwrap().unwrap();
        assert!(user.password_hash.starts_with("$argon2"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_duplicate_email_and_username(pool: PgPool) {
        let app = create_test_app(pool).await;
        app.post("/api/users/").json(&registration()).await.assert_status(StatusCode::CREATED);

        let response = app.post("/api/users/").json(&registration()).await;
        response.assert_status_bad_request();
        response.assert_json(&json!({
            "email": ["A user with that email already exists."],
            "username": ["A user with that username already exists."]
        }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_validation(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app
            .post("/api/users/")
            .json(&json!({"email": "not-an-email", "username": "ok", "password": "123"}))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"][0], "Enter a valid email address.");
        assert_eq!(body["first_name"][0], "This field is required.");
        assert_eq!(body["last_name"][0], "This field is required.");

        let mut weak = registration();
        weak["password"] = json!("12345678");
        let response = app.post("/api/users/").json(&weak).await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(
            body["password"]
                .as_array()
                .unwrap()
                .contains(&json!("This password is entirely numeric."))
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_users_paginated_with_subscription_flag(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let viewer = create_test_user(&pool, "viewer").await;
        let mut authors = Vec::new();
        for i in 0..3 {
            authors.push(create_test_user(&pool, &format!("author{i}")).await);
        }

        let response = app
            .post(&format!("/api/users/{}/subscribe/", authors[0].id))
            .add_header("authorization", token_header(&pool, viewer.id).await)
            .await;
        response.assert_status(StatusCode::CREATED);

        let response = app
            .get("/api/users/?limit=2")
            .add_header("authorization", token_header(&pool, viewer.id).await)
            .await;
        response.assert_status_ok();
        let page: PaginatedResponse<UserResponse> = response.json();
        assert_eq!(page.count, 4);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.next.as_deref(), Some("http://localhost:8000/api/users/?limit=2&page=2"));
        assert!(page.previous.is_none());
        let author = page.results.iter().find(|u| u.id == authors[0].id).unwrap();
        assert!(author.is_subscribed);

        // Anonymous callers see no subscription flags
        let response = app.get("/api/users/?limit=2").await;
        let page: PaginatedResponse<UserResponse> = response.json();
        assert!(page.results.iter().all(|u| !u.is_subscribed));

        let response = app.get("/api/users/?limit=2&page=3").await;
        response.assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_user_and_me(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, "julia").await;

        let response = app.get(&format!("/api/users/{}/", user.id)).await;
        response.assert_status_ok();
        assert_eq!(response.json::<UserResponse>().username, "julia");

        app.get("/api/users/999999/").await.assert_status_not_found();
        app.get("/api/users/me/").await.assert_status_unauthorized();

        let response = app
            .get("/api/users/me/")
            .add_header("authorization", token_header(&pool, user.id).await)
            .await;
        response.assert_status_ok();
        let me: UserResponse = response.json();
        assert_eq!(me.id, user.id);
        assert!(!me.is_subscribed);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_set_password(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, "julia").await;
        let auth = token_header(&pool, user.id).await;

        let response = app
            .post("/api/users/set_password/")
            .add_header("authorization", auth.clone())
            .json(&json!({"current_password": "not-it", "new_password": "Another-Pass-99"}))
            .await;
        response.assert_status_bad_request();
        response.assert_json(&json!({"current_password": ["Invalid password."]}));

        let response = app
            .post("/api/users/set_password/")
            .add_header("authorization", auth)
            .json(&json!({"current_password": TEST_PASSWORD, "new_password": "Another-Pass-99"}))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = app
            .post("/api/auth/token/login/")
            .json(&json!({"email": user.email, "password": "Another-Pass-99"}))
            .await;
        response.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_avatar_upload_and_delete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, "julia").await;
        let auth = token_header(&pool, user.id).await;

        let response = app
            .put("/api/users/me/avatar/")
            .add_header("authorization", auth.clone())
            .json(&json!({}))
            .await;
        response.assert_status_bad_request();
        response.assert_json(&json!({"avatar": ["This field is required."]}));

        let response = app
            .put("/api/users/me/avatar/")
            .add_header("authorization", auth.clone())
            .json(&json!({"avatar": "data:image/png;base64,!!!"}))
            .await;
        response.assert_status_bad_request();

        let response = app
            .put("/api/users/me/avatar/")
            .add_header("authorization", auth.clone())
            .json(&json!({"avatar": PNG_DATA_URI}))
            .await;
        response.assert_status_ok();
        let avatar = response.json::<AvatarResponse>().avatar;
        assert!(avatar.starts_with("http://localhost:8000/media/users/avatars/"));
        assert!(avatar.ends_with(".png"));

        let mut conn = pool.acquire().await.unwrap();
        let stored = Users::new(&mut conn).get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.avatar.is_some());

        let response = app.delete("/api/users/me/avatar/").add_header("authorization", auth).await;
        response.assert_status(StatusCode::NO_CONTENT);

        let stored = Users::new(&mut conn).get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.avatar.is_none());
    }
}

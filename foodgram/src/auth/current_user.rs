use crate::{
    AppState,
    api::models::users::CurrentUser,
    crypto::token_digest,
    db::handlers::AuthTokens,
    errors::{Error, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Prefixes accepted in front of the token in the `Authorization` header
const TOKEN_SCHEMES: [&str; 2] = ["Token ", "Bearer "];

/// Pull the raw token out of the `Authorization` header
/// Returns:
/// - None: No Authorization header
/// - Some(Ok(token)): Header with a known scheme and non-empty token
/// - Some(Err(error)): Header present but not usable
fn extract_token(parts: &Parts) -> Option<Result<&str>> {
    let header = parts.headers.get(AUTHORIZATION)?;

    let header = match header.to_str() {
        Ok(value) => value.trim(),
        Err(_) => {
            return Some(Err(Error::Unauthenticated {
                message: Some("Invalid token header.".to_string()),
            }));
        }
    };

    let token = TOKEN_SCHEMES
        .iter()
        .find_map(|scheme| header.strip_prefix(scheme))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    Some(token.ok_or_else(|| Error::Unauthenticated {
        message: Some("Invalid token header.".to_string()),
    }))
}

/// Resolve the caller for a request that carries a token
#[instrument(skip(token, state), err)]
async fn authenticate(token: &str, state: &AppState) -> Result<CurrentUser> {
    let token_hash = token_digest(state.config.token_key(), token);

    let mut conn = state.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
    let user = AuthTokens::new(&mut conn).find_user(&token_hash).await?;

    match user {
        Some(user) => {
            debug!("Authenticated user {}", user.id);
            Ok(CurrentUser::from_db(user, token_hash))
        }
        None => Err(Error::Unauthenticated {
            message: Some("Invalid token.".to_string()),
        }),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match extract_token(parts) {
            Some(token) => authenticate(token?, state).await,
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

/// Anonymous callers get `None`; a bad token is still rejected rather than silently ignored.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>> {
        match extract_token(parts) {
            Some(token) => authenticate(token?, state).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Admins may act on anything; everyone else only on what they own
pub fn is_owner_or_admin(user: &CurrentUser, owner_id: crate::types::UserId) -> bool {
    user.is_admin || user.id == owner_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::generate_auth_token,
        test_utils::{create_test_state, create_test_user, issue_token},
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/api/users/me/");
        if let Some(value) = value {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (parts, _body) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_token_and_bearer_schemes(pool: PgPool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool, "cook").await;
        let token = issue_token(&state, user.id).await;

        for scheme in ["Token", "Bearer"] {
            let mut parts = parts_with_header(Some(&format!("{scheme} {token}")));
            let current = <CurrentUser as FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
                .await
                .unwrap();
            assert_eq!(current.id, user.id);
            assert_eq!(current.username, "cook");
            assert_eq!(current.token_hash, token_digest(state.config.token_key(), &token));
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_header_is_unauthorized(pool: PgPool) {
        let state = create_test_state(pool);
        let mut parts = parts_with_header(None);

        let err = <CurrentUser as FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Authentication credentials were not provided.");

        let anonymous = <CurrentUser as OptionalFromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(anonymous.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_token_is_rejected(pool: PgPool) {
        let state = create_test_state(pool);

        let mut parts = parts_with_header(Some(&format!("Token {}", generate_auth_token())));
        let err = <CurrentUser as OptionalFromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Invalid token.");

        for header in ["Basic abc", "Token ", "Token"] {
            let mut parts = parts_with_header(Some(header));
            let err = <CurrentUser as FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED, "{header}");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_revoked_token_stops_working(pool: PgPool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool, "cook").await;
        let token = issue_token(&state, user.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let revoked = AuthTokens::new(&mut conn)
            .delete_by_hash(&token_digest(state.config.token_key(), &token))
            .await
            .unwrap();
        assert!(revoked);

        let mut parts = parts_with_header(Some(&format!("Token {token}")));
        assert!(
            <CurrentUser as FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
                .await
                .is_err()
        );
    }
}

//! Database repository for auth tokens.
//!
//! Tokens are looked up by digest only; the raw token is handed to the client once at login and
//! never stored.

use crate::db::{
    errors::Result,
    models::{auth_tokens::AuthTokenDBResponse, users::UserDBResponse},
};
use crate::types::UserId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct AuthTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuthTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, token_hash), err)]
    pub async fn create(&mut self, user_id: UserId, token_hash: &str) -> Result<AuthTokenDBResponse> {
        let token = sqlx::query_as::<_, AuthTokenDBResponse>(
            "INSERT INTO auth_tokens (user_id, token_hash) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Resolve a token digest to the user that owns it
    #[instrument(skip(self, token_hash), err)]
    pub async fn find_user(&mut self, token_hash: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT u.*
            FROM auth_tokens t
            INNER JOIN users u ON t.user_id = u.id
            WHERE t.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self, token_hash), err)]
    pub async fn delete_by_hash(&mut self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

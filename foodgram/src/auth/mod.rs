//! Authentication and authorization.
//!
//! Clients authenticate with an opaque token obtained from `POST /api/auth/token/login/` and
//! sent as `Authorization: Token <key>` (`Bearer <key>` is accepted too). Only a keyed SHA-256
//! digest of each token is stored, so a database dump does not leak usable credentials.
//!
//! # Authorization
//!
//! There are no roles beyond the `is_admin` flag:
//! - anyone may read recipes, tags, ingredients and public profiles
//! - authenticated users manage their own favorites, cart, subscriptions and profile
//! - recipes are changed or deleted by their author or an administrator
//!
//! # Modules
//!
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`middleware`]: Host header validation against `allowed_hosts`
//! - [`password`]: Password hashing, verification and policy using Argon2
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use foodgram::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.username)
//! }
//!
//! // Optional authentication: anonymous callers get `None`
//! async fn public_handler(viewer: Option<CurrentUser>) -> String {
//!     viewer.map_or("Hello, stranger!".to_string(), |u| format!("Hello, {}!", u.username))
//! }
//! ```

pub mod current_user;
pub mod middleware;
pub mod password;

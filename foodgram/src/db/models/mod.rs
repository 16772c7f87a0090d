//! Database record models matching table schemas.
//!
//! These structs correspond to table rows (or joins of them). They derive `sqlx::FromRow` where
//! they are read straight from a query and are kept separate from the API models in
//! [`crate::api::models`], which add viewer-dependent flags and absolute media URLs.
//!
//! - [`users`]: User accounts
//! - [`auth_tokens`]: Digests of issued auth tokens
//! - [`subscriptions`]: Follower to author links
//! - [`tags`]: Recipe tags (seeded by migration)
//! - [`ingredients`]: Ingredient catalogue (loaded with `load-ingredients`)
//! - [`recipes`]: Recipes with their tag and ingredient links

pub mod auth_tokens;
pub mod ingredients;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;

//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction) and
//! exposes strongly typed queries returning models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts, implements [`Repository`]
//! - [`Recipes`]: Recipes with their tags and ingredient lines, implements [`Repository`]
//! - [`AuthTokens`]: Token digests issued at login
//! - [`Tags`]: Read-only tag lookups
//! - [`Ingredients`]: Ingredient search and bulk loading
//! - [`RecipeLists`]: Favorites and shopping cart entries
//! - [`Subscriptions`]: Follower to author links
//!
//! # Common Pattern
//!
//! ```ignore
//! use foodgram::db::handlers::{Recipes, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let recipe = Recipes::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod auth_tokens;
pub mod ingredients;
pub mod recipe_lists;
pub mod recipes;
pub mod repository;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use auth_tokens::AuthTokens;
pub use ingredients::Ingredients;
pub use recipe_lists::{RecipeList, RecipeLists};
pub use recipes::Recipes;
pub use repository::Repository;
pub use subscriptions::Subscriptions;
pub use tags::Tags;
pub use users::Users;

//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Token login and logout
//! - [`users`]: Registration, profiles, password changes and avatars
//! - [`subscriptions`]: Following authors and listing followed authors
//! - [`tags`]: Read-only tag catalogue
//! - [`ingredients`]: Ingredient prefix search
//! - [`recipes`]: Recipe CRUD, favorites, shopping cart, shopping list download and short links
//!
//! # Authentication
//!
//! Handlers that need a caller take a [`CurrentUser`](crate::api::models::users::CurrentUser)
//! argument; read endpoints that merely personalise their output take `Option<CurrentUser>`.

pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;

//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is mounted under `/api`, with trailing slashes on every path:
//!
//! - **Authentication** (`/api/auth/token/*`): Token login and logout
//! - **Users** (`/api/users/*`): Registration, profiles, avatars, password changes
//! - **Subscriptions** (`/api/users/subscriptions/`, `/api/users/{id}/subscribe/`)
//! - **Tags and ingredients** (`/api/tags/*`, `/api/ingredients/*`): Read-only catalogues
//! - **Recipes** (`/api/recipes/*`): Recipes, favorites, shopping cart and short links
//!
//! Short links themselves resolve outside the API prefix, at `/s/{code}`.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/api/docs` when the server is running.

pub mod handlers;
pub mod models;

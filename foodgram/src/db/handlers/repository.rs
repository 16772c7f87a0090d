//! CRUD trait shared by the main entity repositories.
//!
//! `Users` and `Recipes` implement it. Read-only catalogues and the link tables (tokens,
//! favorites, cart, subscriptions) expose only the operations they need as inherent methods.

use std::collections::HashMap;

use crate::db::errors::Result;

/// Create/read/update/delete over one entity, with its own request, response and filter types.
#[async_trait::async_trait]
pub trait Repository {
    /// Payload for `create`
    type CreateRequest;

    /// Payload for `update`
    type UpdateRequest;

    /// Row (plus joined data) handed back to callers
    type Response;

    type Id: Send + Sync;

    /// Narrows and pages `list`
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// `None` when no row has this id
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Fetch many rows at once, keyed by id. Missing ids are absent from the map.
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Returns whether a row was removed
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}

//! Common type definitions shared by the API and database layers.
//!
//! # ID Types
//!
//! All entities use `BIGSERIAL` primary keys. The aliases below keep signatures readable and make
//! it obvious which table an id belongs to:
//!
//! - [`UserId`]: User account identifier
//! - [`RecipeId`]: Recipe identifier (also the source of short links)
//! - [`TagId`]: Tag identifier
//! - [`IngredientId`]: Ingredient identifier
//! - [`TokenId`]: Auth token row identifier
//!
//! # Operations
//!
//! [`Operation`] names the action a caller attempted when an authorization check fails, so that
//! the error message reads "Insufficient permissions to update recipe 12".

use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for IDs
pub type UserId = i64;
pub type RecipeId = i64;
pub type TagId = i64;
pub type IngredientId = i64;
pub type TokenId = i64;

/// Operations that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(verb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Update.to_string(), "update");
        assert_eq!(format!("{}", Operation::Delete), "delete");
    }
}

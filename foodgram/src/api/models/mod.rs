//! API request and response data models.
//!
//! These structures define the public JSON contract and are kept apart from the database models
//! in [`crate::db::models`]. Response models add what only the API knows about: absolute media
//! URLs and flags that depend on who is asking (`is_subscribed`, `is_favorited`,
//! `is_in_shopping_cart`).
//!
//! Request models use `Option` fields so that a missing field is reported as a field-level
//! validation error (`{"name": ["This field is required."]}`) rather than a deserialization
//! failure.
//!
//! - [`auth`]: Token login
//! - [`users`]: Registration, profiles, avatars, subscriptions
//! - [`tags`], [`ingredients`]: Read-only catalogues
//! - [`recipes`]: Recipe create/update payloads and responses
//! - [`pagination`]: Page-based list envelopes

pub mod auth;
pub mod ingredients;
pub mod pagination;
pub mod recipes;
pub mod tags;
pub mod users;

use crate::errors::FieldErrors;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// A required value of any type
pub(crate) fn required_value<T>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        push_error(errors, field, REQUIRED);
    }
    value
}

/// A required, non-blank string of at most `max_length` characters, trimmed
pub(crate) fn required_field(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_length: usize,
) -> Option<String> {
    let value = required_value(errors, field, value)?;
    let trimmed = value.trim();

    if trimmed.is_empty() {
        push_error(errors, field, BLANK);
        return None;
    }
    if trimmed.chars().count() > max_length {
        push_error(
            errors,
            field,
            format!("Ensure this field has no more than {max_length} characters."),
        );
        return None;
    }

    Some(trimmed.to_string())
}

/// An integer in `min..=max`
pub(crate) fn bounded_value(errors: &mut FieldErrors, field: &str, value: i64, min: i64, max: i64) -> Option<i32> {
    if value < min {
        push_error(errors, field, format!("Ensure this value is greater than or equal to {min}."));
        return None;
    }
    if value > max {
        push_error(errors, field, format!("Ensure this value is less than or equal to {max}."));
        return None;
    }
    i32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_field() {
        let mut errors = FieldErrors::new();

        assert_eq!(
            required_field(&mut errors, "name", Some("  Borscht ".to_string()), 10),
            Some("Borscht".to_string())
        );
        assert!(errors.is_empty());

        assert_eq!(required_field(&mut errors, "missing", None, 10), None);
        assert_eq!(required_field(&mut errors, "blank", Some("   ".to_string()), 10), None);
        assert_eq!(required_field(&mut errors, "long", Some("x".repeat(11)), 10), None);

        assert_eq!(errors["missing"], vec![REQUIRED.to_string()]);
        assert_eq!(errors["blank"], vec![BLANK.to_string()]);
        assert_eq!(
            errors["long"],
            vec!["Ensure this field has no more than 10 characters.".to_string()]
        );
    }

    #[test]
    fn test_bounded_value() {
        let mut errors = FieldErrors::new();
        assert_eq!(bounded_value(&mut errors, "cooking_time", 1, 1, 32000), Some(1));
        assert_eq!(bounded_value(&mut errors, "cooking_time", 32000, 1, 32000), Some(32000));
        assert!(errors.is_empty());

        assert_eq!(bounded_value(&mut errors, "low", 0, 1, 32000), None);
        assert_eq!(bounded_value(&mut errors, "high", 32001, 1, 32000), None);
        assert_eq!(
            errors["low"],
            vec!["Ensure this value is greater than or equal to 1.".to_string()]
        );
        assert_eq!(
            errors["high"],
            vec!["Ensure this value is less than or equal to 32000.".to_string()]
        );
    }
}

//! crates/bookstore_core/src/validation.rs
//!
//! Field-level checks shared by the author, book and order services so that
//! thresholds and messages stay identical everywhere.

use crate::error::ValidationError;

/// Rejects strings that are empty after trimming whitespace.
pub fn require_text(value: &str, message: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(message));
    }
    Ok(())
}

/// Rejects ids that are zero or negative.
pub fn require_positive_id(id: i64, message: &str) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::new(message));
    }
    Ok(())
}

pub fn require_positive(value: i32, message: &str) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::new(message));
    }
    Ok(())
}

pub fn require_non_negative(value: i32, message: &str) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::new(message));
    }
    Ok(())
}

/// Fails if `candidate` matches any of `existing`, ignoring case and
/// surrounding whitespace.
pub fn ensure_unique_name<'a, I>(
    candidate: &str,
    existing: I,
    message: &str,
) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = candidate.trim().to_lowercase();
    if existing
        .into_iter()
        .any(|name| name.trim().to_lowercase() == wanted)
    {
        return Err(ValidationError::new(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", false)]
    #[case("   ", false)]
    #[case("\t\n", false)]
    #[case("pending", true)]
    #[case("  shipped ", true)]
    fn text_must_not_be_blank(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(require_text(value, "status is required").is_ok(), ok);
    }

    #[rstest]
    #[case(-1, false)]
    #[case(0, false)]
    #[case(1, true)]
    #[case(i64::MAX, true)]
    fn ids_must_be_positive(#[case] id: i64, #[case] ok: bool) {
        assert_eq!(require_positive_id(id, "invalid order ID").is_ok(), ok);
    }

    #[test]
    fn quantity_and_stock_thresholds_differ_at_zero() {
        assert!(require_positive(0, "quantity").is_err());
        assert!(require_non_negative(0, "stock").is_ok());
        assert!(require_non_negative(-1, "stock").is_err());
    }

    #[test]
    fn error_carries_the_callers_message() {
        let err = require_text(" ", "author name cannot be empty").unwrap_err();
        assert_eq!(err.to_string(), "author name cannot be empty");
    }

    #[test]
    fn duplicate_names_compare_case_insensitively() {
        let existing = ["John", "Mary Shelley"];
        let msg = "author with the same name already exists";
        assert!(ensure_unique_name("john", existing, msg).is_err());
        assert!(ensure_unique_name(" MARY SHELLEY ", existing, msg).is_err());
        assert!(ensure_unique_name("Jon", existing, msg).is_ok());
        assert!(ensure_unique_name("anyone", std::iter::empty(), msg).is_ok());
    }
}

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::fmt;

pub const NOTE_MAX_LEN: usize = 1000;
pub const LOCATION_MAX_LEN: usize = 255;
pub const SEARCH_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_amount_range(
    min: Option<&BigDecimal>,
    max: Option<&BigDecimal>,
) -> ValidationResult {
    if let Some(min) = min {
        if min < &BigDecimal::from(0) {
            return Err(ValidationError::new("min_amount", "must not be negative"));
        }
    }

    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ValidationError::new(
                "min_amount",
                "must not exceed max_amount",
            ));
        }
    }

    Ok(())
}

pub fn validate_date_range(
    from: Option<&DateTime<Utc>>,
    to: Option<&DateTime<Utc>>,
) -> ValidationResult {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ValidationError::new(
                "date_from",
                "must not be later than date_to",
            ));
        }
    }

    Ok(())
}

pub fn validate_page(page: usize, limit: usize) -> ValidationResult {
    if page == 0 {
        return Err(ValidationError::new("page", "is 1-indexed and must be >= 1"));
    }

    if limit == 0 {
        return Err(ValidationError::new("limit", "must be >= 1"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
    }

    #[test]
    fn validates_amount_range() {
        let one = BigDecimal::from(1);
        let ten = BigDecimal::from(10);
        let negative = BigDecimal::from(-5);

        assert!(validate_amount_range(Some(&one), Some(&ten)).is_ok());
        assert!(validate_amount_range(Some(&ten), Some(&one)).is_err());
        assert!(validate_amount_range(Some(&negative), None).is_err());
        assert!(validate_amount_range(None, Some(&ten)).is_ok());
        assert!(validate_amount_range(None, None).is_ok());
    }

    #[test]
    fn validates_date_range() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::days(1);

        assert!(validate_date_range(Some(&earlier), Some(&later)).is_ok());
        assert!(validate_date_range(Some(&later), Some(&earlier)).is_err());
        assert!(validate_date_range(Some(&earlier), None).is_ok());
    }

    #[test]
    fn validates_page() {
        assert!(validate_page(1, 10).is_ok());
        assert!(validate_page(0, 10).is_err());
        assert!(validate_page(1, 0).is_err());
    }

    #[test]
    fn validation_error_display_includes_field() {
        let err = ValidationError::new("reason", "must not be empty");
        assert_eq!(err.to_string(), "reason: must not be empty");
    }
}

//! Helpers shared by the per-entity payload validators.

use crate::error::ValidationError;

/// A text field that must be present and non-blank; returned trimmed.
pub fn required_text(field: &str, value: Option<String>) -> Result<String, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        Some(_) => Err(ValidationError::new(field, "must not be empty")),
        None => Err(ValidationError::required(field)),
    }
}

/// An optional text field; blank collapses to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("name", Some("  Acme  ".into())).unwrap(), "Acme");
        assert_eq!(required_text("name", Some("   ".into())).unwrap_err().message, "must not be empty");
        assert_eq!(required_text("name", None).unwrap_err().message, "is required");
    }

    #[test]
    fn optional_text_collapses_blank() {
        assert_eq!(optional_text(Some(" ".into())), None);
        assert_eq!(optional_text(Some(" x ".into())).as_deref(), Some("x"));
        assert_eq!(optional_text(None), None);
    }
}

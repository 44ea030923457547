use serde::{Deserialize, Serialize};

use gstbook_core::{ValidationError, ValueObject};

/// GST rules cap invoice serial numbers at 16 characters.
const MAX_LEN: usize = 16;

/// Invoice serial number, unique per client.
///
/// Letters, digits, `-` and `/` only, at most 16 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceNumber(String);

impl ValueObject for InvoiceNumber {}

impl InvoiceNumber {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ValidationError::new("number", "must not be empty"));
        }
        if value.len() > MAX_LEN {
            return Err(ValidationError::new(
                "number",
                format!("must be at most {MAX_LEN} characters"),
            ));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
        {
            return Err(ValidationError::new(
                "number",
                "may only contain letters, digits, '-' and '/'",
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// The `sequence`-th number in a client's series: `<prefix><sequence:04>`.
    pub fn next(prefix: &str, sequence: u64) -> Result<Self, ValidationError> {
        Self::parse(&format!("{prefix}{sequence:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InvoiceNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InvoiceNumber> for String {
    fn from(value: InvoiceNumber) -> Self {
        value.0
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

//! GSTIN and GST state codes.

use serde::{Deserialize, Serialize};

use gstbook_core::{ValidationError, ValueObject};

const GSTIN_LEN: usize = 15;
const CHECKSUM_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// GST state codes as used in the first two digits of a GSTIN.
const STATES: &[(u8, &str)] = &[
    (1, "Jammu and Kashmir"),
    (2, "Himachal Pradesh"),
    (3, "Punjab"),
    (4, "Chandigarh"),
    (5, "Uttarakhand"),
    (6, "Haryana"),
    (7, "Delhi"),
    (8, "Rajasthan"),
    (9, "Uttar Pradesh"),
    (10, "Bihar"),
    (11, "Sikkim"),
    (12, "Arunachal Pradesh"),
    (13, "Nagaland"),
    (14, "Manipur"),
    (15, "Mizoram"),
    (16, "Tripura"),
    (17, "Meghalaya"),
    (18, "Assam"),
    (19, "West Bengal"),
    (20, "Jharkhand"),
    (21, "Odisha"),
    (22, "Chhattisgarh"),
    (23, "Madhya Pradesh"),
    (24, "Gujarat"),
    (25, "Daman and Diu"),
    (26, "Dadra and Nagar Haveli and Daman and Diu"),
    (27, "Maharashtra"),
    (28, "Andhra Pradesh (Old)"),
    (29, "Karnataka"),
    (30, "Goa"),
    (31, "Lakshadweep"),
    (32, "Kerala"),
    (33, "Tamil Nadu"),
    (34, "Puducherry"),
    (35, "Andaman and Nicobar Islands"),
    (36, "Telangana"),
    (37, "Andhra Pradesh"),
    (38, "Ladakh"),
    (97, "Other Territory"),
    (99, "Centre Jurisdiction"),
];

/// A GST state code (e.g. `27` for Maharashtra).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StateCode(u8);

impl ValueObject for StateCode {}

impl StateCode {
    pub fn new(code: u8) -> Option<Self> {
        STATES.iter().any(|(c, _)| *c == code).then_some(Self(code))
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        STATES
            .iter()
            .find(|(c, _)| *c == self.0)
            .map(|(_, n)| *n)
            .unwrap_or("Unknown")
    }

    /// Resolve a free-text place of supply.
    ///
    /// Accepts a bare state code (`"29"`), a state name (`"karnataka"`), or an
    /// address that mentions a state as a whole word; the longest matching
    /// name wins (`"Andhra Pradesh"` over a shorter overlap).
    pub fn parse_place(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.len() <= 2 && text.bytes().all(|b| b.is_ascii_digit()) {
            return text.parse().ok().and_then(Self::new);
        }

        let haystack = text.to_ascii_lowercase();
        STATES
            .iter()
            .filter(|(code, _)| *code != 28)
            .filter(|(_, name)| contains_word(&haystack, &name.to_ascii_lowercase()))
            .max_by_key(|(_, name)| name.len())
            .map(|(code, _)| Self(*code))
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

impl TryFrom<u8> for StateCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("unknown GST state code {value:02}"))
    }
}

impl From<StateCode> for u8 {
    fn from(value: StateCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for StateCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// GST Identification Number: state code, PAN, entity code, `Z`, checksum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gstin(String);

impl ValueObject for Gstin {}

impl Gstin {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim().to_ascii_uppercase();
        let invalid = |msg: &str| ValidationError::new("gstin", msg);

        if value.len() != GSTIN_LEN || !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid("must be 15 letters or digits"));
        }
        let b = value.as_bytes();

        if value[..2].parse::<u8>().ok().and_then(StateCode::new).is_none() {
            return Err(invalid("does not start with a valid state code"));
        }

        let pan_ok = b[2..7].iter().all(u8::is_ascii_uppercase)
            && b[7..11].iter().all(u8::is_ascii_digit)
            && b[11].is_ascii_uppercase();
        if !pan_ok {
            return Err(invalid("does not contain a valid PAN"));
        }
        if b[12] == b'0' {
            return Err(invalid("has an invalid entity code"));
        }
        if checksum_char(&b[..14]) != b[14] {
            return Err(invalid("checksum does not match"));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Registered state of the holder.
    pub fn state_code(&self) -> StateCode {
        // Validated on construction.
        StateCode(self.0[..2].parse().unwrap_or_default())
    }

    /// Embedded PAN of the holder.
    pub fn pan(&self) -> &str {
        &self.0[2..12]
    }
}

fn checksum_char(body: &[u8]) -> u8 {
    let sum: u32 = body
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let value = CHECKSUM_ALPHABET.iter().position(|a| a == c).unwrap_or(0) as u32;
            let product = value * if i % 2 == 0 { 1 } else { 2 };
            product / 36 + product % 36
        })
        .sum();
    CHECKSUM_ALPHABET[((36 - sum % 36) % 36) as usize]
}

impl TryFrom<String> for Gstin {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Gstin> for String {
    fn from(value: Gstin) -> Self {
        value.0
    }
}

impl core::str::FromStr for Gstin {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for Gstin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

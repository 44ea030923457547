//! Bearer token verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, JwtClaims, TokenValidationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("malformed or unsigned token: {0}")]
    Malformed(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Turns a raw bearer token into verified claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// HMAC-SHA256 signed tokens with a shared secret.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run against our own `issued_at`/`expires_at` claims.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            JwtError::Malformed(e.to_string())
        })?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gstbook_core::UserId;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("failed to encode jwt")
    }

    fn fresh_claims() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: UserId::new(),
            issued_at: now - Duration::seconds(5),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn round_trips_a_signed_token() {
        let claims = fresh_claims();
        let token = mint("s3cret", &claims);
        let validator = Hs256JwtValidator::new("s3cret");
        assert_eq!(validator.validate(&token, Utc::now()), Ok(claims));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint("s3cret", &fresh_claims());
        let validator = Hs256JwtValidator::new("other");
        assert!(matches!(
            validator.validate(&token, Utc::now()),
            Err(JwtError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let claims = fresh_claims();
        let token = mint("s3cret", &claims);
        let validator = Hs256JwtValidator::new("s3cret");
        let later = claims.expires_at + Duration::seconds(1);
        assert_eq!(
            validator.validate(&token, later),
            Err(JwtError::Claims(TokenValidationError::Expired))
        );
    }

    #[test]
    fn rejects_garbage() {
        let validator = Hs256JwtValidator::new("s3cret");
        assert!(validator.validate("not-a-jwt", Utc::now()).is_err());
    }

    #[test]
    fn claims_serialize_as_plain_json() {
        let claims = fresh_claims();
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], claims.sub.to_string());
        assert!(json["expires_at"].is_string());
    }
}

//! `gstbook-auth`: authentication and ownership checks.
//!
//! Decoupled from HTTP and storage: the API layer hands in a bearer token and
//! gets back a [`Principal`], then asks [`ensure_owner`] before touching a
//! client's books.

pub mod authorize;
pub mod claims;
pub mod jwt;

pub use authorize::{ensure_owner, AuthzError, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};

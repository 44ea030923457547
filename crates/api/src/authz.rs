//! API-side ownership guard.
//!
//! Runs before any client-scoped read or write, keeping domain and infra
//! crates auth-agnostic.

use gstbook_auth::{ensure_owner, AuthzError, Principal};
use gstbook_parties::Client;

use crate::context::{ClientContext, PrincipalContext};

/// Check that the caller owns `client` and hand back its context.
pub fn authorize_client(principal: &PrincipalContext, client: Client) -> Result<ClientContext, AuthzError> {
    let principal = Principal::new(principal.user_id());
    ensure_owner(&principal, client.owner)?;
    Ok(ClientContext::new(client))
}

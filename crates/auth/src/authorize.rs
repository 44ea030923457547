use thiserror::Error;

use gstbook_core::UserId;

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
}

impl Principal {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: resource belongs to another user")]
    NotOwner,
}

/// Every client, and everything under it, is visible only to the user who
/// registered it.
///
/// - No IO
/// - No panics
pub fn ensure_owner(principal: &Principal, owner: UserId) -> Result<(), AuthzError> {
    if principal.user_id == owner {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

use gstbook_core::{ClientId, UserId};
use gstbook_parties::Client;

/// Principal context for a request (authenticated identity).
///
/// Inserted by the auth middleware; must be present for all protected routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
}

impl PrincipalContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// The client workspace a request operates on.
///
/// Built only after the client was loaded and its ownership checked, then
/// passed explicitly to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    client: Client,
}

impl ClientContext {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client_id(&self) -> ClientId {
        self.client.id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

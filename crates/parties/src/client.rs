use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gstbook_core::validate::{optional_text, required_text};
use gstbook_core::{ClientId, Entity, UserId, ValidationError};

use crate::gstin::{Gstin, StateCode};

/// Prefix used for invoice numbers when a client doesn't configure one.
pub const DEFAULT_INVOICE_PREFIX: &str = "INV-";

const MAX_PREFIX_LEN: usize = 10;

/// A client workspace: a GST-registered business managed by an accountant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    /// The accountant who owns this workspace.
    pub owner: UserId,
    /// Trade/legal name.
    pub name: String,
    pub gstin: Gstin,
    pub address: String,
    pub invoice_prefix: String,
    pub bank_details: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Client {
    pub fn register(id: ClientId, owner: UserId, new: NewClient, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            name: new.name,
            gstin: new.gstin,
            address: new.address,
            invoice_prefix: new.invoice_prefix,
            bank_details: new.bank_details,
            logo_url: new.logo_url,
            created_at: now,
        }
    }

    /// State the client is registered in (drives the intra/inter-state decision).
    pub fn state_code(&self) -> StateCode {
        self.gstin.state_code()
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }

    pub fn apply(&mut self, patch: ClientPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(gstin) = patch.gstin {
            self.gstin = gstin;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(prefix) = patch.invoice_prefix {
            self.invoice_prefix = prefix;
        }
        if let Some(bank_details) = patch.bank_details {
            self.bank_details = bank_details;
        }
        if let Some(logo_url) = patch.logo_url {
            self.logo_url = logo_url;
        }
    }
}

/// Raw create-client request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPayload {
    pub name: Option<String>,
    pub gstin: Option<String>,
    pub address: Option<String>,
    pub invoice_prefix: Option<String>,
    pub bank_details: Option<String>,
    pub logo_url: Option<String>,
}

/// Validated input for registering a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub gstin: Gstin,
    pub address: String,
    pub invoice_prefix: String,
    pub bank_details: Option<String>,
    pub logo_url: Option<String>,
}

/// Raw update-client request body; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPatchPayload {
    pub name: Option<String>,
    pub gstin: Option<String>,
    pub address: Option<String>,
    pub invoice_prefix: Option<String>,
    pub bank_details: Option<String>,
    pub logo_url: Option<String>,
}

/// Validated client update. For the optional details `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub gstin: Option<Gstin>,
    pub address: Option<String>,
    pub invoice_prefix: Option<String>,
    pub bank_details: Option<Option<String>>,
    pub logo_url: Option<Option<String>>,
}

fn validate_prefix(raw: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(prefix) = optional_text(raw) else {
        return Ok(None);
    };
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(ValidationError::new(
            "invoice_prefix",
            format!("must be at most {MAX_PREFIX_LEN} characters"),
        ));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("invoice_prefix", "must not contain whitespace"));
    }
    Ok(Some(prefix))
}

fn validate_gstin(raw: Option<String>) -> Result<Gstin, ValidationError> {
    Gstin::parse(&required_text("gstin", raw)?)
}

pub fn validate_client(payload: ClientPayload) -> Result<NewClient, ValidationError> {
    Ok(NewClient {
        name: required_text("name", payload.name)?,
        gstin: validate_gstin(payload.gstin)?,
        address: required_text("address", payload.address)?,
        invoice_prefix: validate_prefix(payload.invoice_prefix)?
            .unwrap_or_else(|| DEFAULT_INVOICE_PREFIX.to_string()),
        bank_details: optional_text(payload.bank_details),
        logo_url: optional_text(payload.logo_url),
    })
}

pub fn validate_client_patch(payload: ClientPatchPayload) -> Result<ClientPatch, ValidationError> {
    Ok(ClientPatch {
        name: payload.name.map(|v| required_text("name", Some(v))).transpose()?,
        gstin: payload.gstin.map(|v| validate_gstin(Some(v))).transpose()?,
        address: payload.address.map(|v| required_text("address", Some(v))).transpose()?,
        invoice_prefix: validate_prefix(payload.invoice_prefix)?,
        bank_details: payload.bank_details.map(|v| optional_text(Some(v))),
        logo_url: payload.logo_url.map(|v| optional_text(Some(v))),
    })
}

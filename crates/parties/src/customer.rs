use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gstbook_core::validate::{optional_text, required_text};
use gstbook_core::{ClientId, CustomerId, Entity, ValidationError};

use crate::gstin::{Gstin, StateCode};

/// A customer billed by a client. Customers without a GSTIN are B2C.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub client_id: ClientId,
    pub name: String,
    pub gstin: Option<Gstin>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Customer {
    pub fn register(id: CustomerId, client_id: ClientId, new: NewCustomer, now: DateTime<Utc>) -> Self {
        Self {
            id,
            client_id,
            name: new.name,
            gstin: new.gstin,
            address: new.address,
            email: new.email,
            phone: new.phone,
            created_at: now,
        }
    }

    pub fn is_b2c(&self) -> bool {
        self.gstin.is_none()
    }

    /// Registered state, when the customer has a GSTIN.
    pub fn state_code(&self) -> Option<StateCode> {
        self.gstin.as_ref().map(Gstin::state_code)
    }

    pub fn apply(&mut self, patch: CustomerPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(gstin) = patch.gstin {
            self.gstin = gstin;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
    }
}

/// Raw create-customer request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPayload {
    pub name: Option<String>,
    pub gstin: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub gstin: Option<Gstin>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Raw update-customer request body; a blank optional field clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPatchPayload {
    pub name: Option<String>,
    pub gstin: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub gstin: Option<Option<Gstin>>,
    pub address: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

fn validate_gstin(raw: Option<String>) -> Result<Option<Gstin>, ValidationError> {
    optional_text(raw).map(|v| Gstin::parse(&v)).transpose()
}

fn validate_email(raw: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(email) = optional_text(raw) else {
        return Ok(None);
    };
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("email", "is not a valid email address"));
    }
    Ok(Some(email))
}

fn validate_phone(raw: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(phone) = optional_text(raw) else {
        return Ok(None);
    };
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !allowed || !(7..=15).contains(&digits) {
        return Err(ValidationError::new("phone", "is not a valid phone number"));
    }
    Ok(Some(phone))
}

pub fn validate_customer(payload: CustomerPayload) -> Result<NewCustomer, ValidationError> {
    Ok(NewCustomer {
        name: required_text("name", payload.name)?,
        gstin: validate_gstin(payload.gstin)?,
        address: optional_text(payload.address),
        email: validate_email(payload.email)?,
        phone: validate_phone(payload.phone)?,
    })
}

pub fn validate_customer_patch(payload: CustomerPatchPayload) -> Result<CustomerPatch, ValidationError> {
    Ok(CustomerPatch {
        name: payload.name.map(|v| required_text("name", Some(v))).transpose()?,
        gstin: payload.gstin.map(|v| validate_gstin(Some(v))).transpose()?,
        address: payload.address.map(|v| optional_text(Some(v))),
        email: payload.email.map(|v| validate_email(Some(v))).transpose()?,
        phone: payload.phone.map(|v| validate_phone(Some(v))).transpose()?,
    })
}

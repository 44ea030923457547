//! Parties: the client businesses an accountant manages and their customers.
//!
//! Pure domain logic without IO. Raw request payloads are
//! turned into typed values by one `validate_*` function per entity shape.

pub mod client;
pub mod customer;
pub mod gstin;

pub use client::{
    validate_client, validate_client_patch, Client, ClientPatch, ClientPatchPayload, ClientPayload,
    NewClient, DEFAULT_INVOICE_PREFIX,
};
pub use customer::{
    validate_customer, validate_customer_patch, Customer, CustomerPatch, CustomerPatchPayload,
    CustomerPayload, NewCustomer,
};
pub use gstin::{Gstin, StateCode};

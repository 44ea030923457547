//! Persistence for clients, customers and invoices.
//!
//! Every invoice-side query is scoped by `ClientId`; ownership of the client
//! itself is checked by the caller before any of these run.

use async_trait::async_trait;
use thiserror::Error;

use gstbook_core::{ClientId, CustomerId, DomainError, InvoiceId, UserId};
use gstbook_invoicing::Invoice;
use gstbook_parties::{Client, Customer};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Domain view of the error; backend failures have none.
    pub fn into_domain(self) -> Result<DomainError, String> {
        match self {
            StoreError::NotFound => Ok(DomainError::not_found()),
            StoreError::Conflict(msg) => Ok(DomainError::conflict(msg)),
            StoreError::Backend(msg) => Err(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Clients registered by `owner`, oldest first.
    async fn list_clients(&self, owner: UserId) -> StoreResult<Vec<Client>>;
    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>>;
    async fn insert_client(&self, client: &Client) -> StoreResult<()>;
    async fn update_client(&self, client: &Client) -> StoreResult<()>;
    /// Removes the client and its customers. Refused while invoices exist.
    async fn delete_client(&self, id: ClientId) -> StoreResult<()>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn list_customers(&self, client_id: ClientId) -> StoreResult<Vec<Customer>>;
    async fn get_customer(&self, client_id: ClientId, id: CustomerId) -> StoreResult<Option<Customer>>;
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()>;
    async fn update_customer(&self, customer: &Customer) -> StoreResult<()>;
    /// Refused while invoices reference the customer.
    async fn delete_customer(&self, client_id: ClientId, id: CustomerId) -> StoreResult<()>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Newest invoice date first.
    async fn list_invoices(&self, client_id: ClientId) -> StoreResult<Vec<Invoice>>;
    async fn get_invoice(&self, client_id: ClientId, id: InvoiceId) -> StoreResult<Option<Invoice>>;
    async fn count_invoices(&self, client_id: ClientId) -> StoreResult<u64>;
    /// `Conflict` when the client already has an invoice with this number.
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    /// Header and items are replaced wholesale.
    async fn replace_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn delete_invoice(&self, client_id: ClientId, id: InvoiceId) -> StoreResult<()>;
}

/// Everything the API needs from storage.
pub trait Store: ClientStore + CustomerStore + InvoiceStore {}

impl<S> Store for S where S: ClientStore + CustomerStore + InvoiceStore {}

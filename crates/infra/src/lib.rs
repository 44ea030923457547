//! Infrastructure layer: persistence adapters.

pub mod store;

pub use store::{ClientStore, CustomerStore, InMemoryStore, InvoiceStore, Store, StoreError, StoreResult};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;

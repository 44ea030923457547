use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use gstbook_core::{ClientId, CustomerId, Entity, InvoiceId, UserId};
use gstbook_invoicing::Invoice;
use gstbook_parties::{Client, Customer};

use super::{ClientStore, CustomerStore, InvoiceStore, StoreError, StoreResult};

/// In-memory store for tests/dev. Not optimized for performance.
///
/// Operations that span tables lock `invoices` first, then `clients`, then
/// `customers`; the invoices write lock serializes reference checks against
/// invoice writes.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    clients: RwLock<HashMap<ClientId, Client>>,
    customers: RwLock<HashMap<CustomerId, Customer>>,
    invoices: RwLock<HashMap<InvoiceId, Invoice>>,
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Foreign-key check for an invoice write; call with the invoices lock held.
    fn ensure_parties(&self, invoice: &Invoice) -> StoreResult<()> {
        if !read(&self.clients)?.contains_key(&invoice.client_id) {
            return Err(StoreError::Conflict(format!("client {} does not exist", invoice.client_id)));
        }
        let customer_known = read(&self.customers)?
            .get(&invoice.customer_id)
            .is_some_and(|c| c.client_id == invoice.client_id);
        if !customer_known {
            return Err(StoreError::Conflict(format!("customer {} does not exist", invoice.customer_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ClientStore for InMemoryStore {
    async fn list_clients(&self, owner: UserId) -> StoreResult<Vec<Client>> {
        let mut clients: Vec<Client> = read(&self.clients)?
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        clients.sort_by_key(|c| c.created_at);
        Ok(clients)
    }

    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        Ok(read(&self.clients)?.get(&id).cloned())
    }

    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        let mut clients = write(&self.clients)?;
        if clients.contains_key(&client.id()) {
            return Err(StoreError::Conflict(format!("client {} already exists", client.id)));
        }
        clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        let mut clients = write(&self.clients)?;
        match clients.get_mut(&client.id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_client(&self, id: ClientId) -> StoreResult<()> {
        let invoices = write(&self.invoices)?;
        if invoices.values().any(|inv| inv.client_id == id) {
            return Err(StoreError::Conflict("client still has invoices".to_string()));
        }
        let mut clients = write(&self.clients)?;
        let mut customers = write(&self.customers)?;
        if clients.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        customers.retain(|_, c| c.client_id != id);
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn list_customers(&self, client_id: ClientId) -> StoreResult<Vec<Customer>> {
        let mut customers: Vec<Customer> = read(&self.customers)?
            .values()
            .filter(|c| c.client_id == client_id)
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn get_customer(&self, client_id: ClientId, id: CustomerId) -> StoreResult<Option<Customer>> {
        Ok(read(&self.customers)?
            .get(&id)
            .filter(|c| c.client_id == client_id)
            .cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut customers = write(&self.customers)?;
        if customers.contains_key(&customer.id()) {
            return Err(StoreError::Conflict(format!("customer {} already exists", customer.id)));
        }
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut customers = write(&self.customers)?;
        match customers.get_mut(&customer.id) {
            Some(existing) if existing.client_id == customer.client_id => {
                *existing = customer.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete_customer(&self, client_id: ClientId, id: CustomerId) -> StoreResult<()> {
        let invoices = write(&self.invoices)?;
        if invoices.values().any(|inv| inv.customer_id == id) {
            return Err(StoreError::Conflict("customer is referenced by invoices".to_string()));
        }
        let mut customers = write(&self.customers)?;
        match customers.get(&id) {
            Some(c) if c.client_id == client_id => {
                customers.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn list_invoices(&self, client_id: ClientId) -> StoreResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = read(&self.invoices)?
            .values()
            .filter(|inv| inv.client_id == client_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(invoices)
    }

    async fn get_invoice(&self, client_id: ClientId, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(read(&self.invoices)?
            .get(&id)
            .filter(|inv| inv.client_id == client_id)
            .cloned())
    }

    async fn count_invoices(&self, client_id: ClientId) -> StoreResult<u64> {
        let count = read(&self.invoices)?
            .values()
            .filter(|inv| inv.client_id == client_id)
            .count();
        Ok(count as u64)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut invoices = write(&self.invoices)?;
        self.ensure_parties(invoice)?;
        let duplicate = invoices
            .values()
            .any(|inv| inv.client_id == invoice.client_id && inv.number == invoice.number);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "invoice number {} already exists",
                invoice.number
            )));
        }
        invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut invoices = write(&self.invoices)?;
        self.ensure_parties(invoice)?;
        let duplicate = invoices.values().any(|inv| {
            !inv.is_same(invoice) && inv.client_id == invoice.client_id && inv.number == invoice.number
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "invoice number {} already exists",
                invoice.number
            )));
        }
        match invoices.get_mut(&invoice.id) {
            Some(existing) if existing.client_id == invoice.client_id => {
                *existing = invoice.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete_invoice(&self, client_id: ClientId, id: InvoiceId) -> StoreResult<()> {
        let mut invoices = write(&self.invoices)?;
        match invoices.get(&id) {
            Some(inv) if inv.client_id == client_id => {
                invoices.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}

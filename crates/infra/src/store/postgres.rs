//! Postgres-backed store.
//!
//! Money columns are `NUMERIC` and round-trip through `rust_decimal` without
//! loss. Invoice writes run in one transaction: the header is upserted and the
//! items are deleted and re-inserted, so a reader never sees half an invoice.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` (unique violation) | `Conflict` | duplicate invoice number for a client |
//! | `23503` (foreign key violation) | `Conflict` | deleting a client/customer still referenced by invoices |
//! | any other | `Backend` | connectivity, corrupt rows, etc. |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use gstbook_core::{ClientId, CustomerId, InvoiceId, UserId};
use gstbook_invoicing::{Invoice, InvoiceItem, InvoiceNumber};
use gstbook_parties::{Client, Customer, Gstin};
use gstbook_tax::{InvoiceTotals, LineItemResult};

use super::{ClientStore, CustomerStore, InvoiceStore, StoreError, StoreResult};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Postgres-backed store. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Apply `migrations/0001_init.sql`; every statement is idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn load_items(&self, invoice_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<InvoiceItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT invoice_id, line_no, description, hsn, quantity, rate, gst_rate,
                   amount, tax_amount, cgst, sgst, igst
            FROM invoice_items
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, line_no
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        let mut items: HashMap<Uuid, Vec<InvoiceItem>> = HashMap::new();
        for row in rows {
            let invoice_id: Uuid = row.try_get("invoice_id").map_err(corrupt)?;
            items.entry(invoice_id).or_default().push(item_from_row(&row)?);
        }
        Ok(items)
    }

    async fn hydrate(&self, headers: Vec<InvoiceHeaderRow>) -> StoreResult<Vec<Invoice>> {
        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let mut items = self.load_items(&ids).await?;
        headers
            .into_iter()
            .map(|h| {
                let lines = items.remove(&h.id).unwrap_or_default();
                h.into_invoice(lines)
            })
            .collect()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt row: {err}"))
}

// SQLx row types

fn client_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Client> {
    let gstin: String = row.try_get("gstin").map_err(corrupt)?;
    Ok(Client {
        id: ClientId::from_uuid(row.try_get("id").map_err(corrupt)?),
        owner: UserId::from_uuid(row.try_get("owner_id").map_err(corrupt)?),
        name: row.try_get("name").map_err(corrupt)?,
        gstin: Gstin::parse(&gstin).map_err(corrupt)?,
        address: row.try_get("address").map_err(corrupt)?,
        invoice_prefix: row.try_get("invoice_prefix").map_err(corrupt)?,
        bank_details: row.try_get("bank_details").map_err(corrupt)?,
        logo_url: row.try_get("logo_url").map_err(corrupt)?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
    })
}

fn customer_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Customer> {
    let gstin: Option<String> = row.try_get("gstin").map_err(corrupt)?;
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get("id").map_err(corrupt)?),
        client_id: ClientId::from_uuid(row.try_get("client_id").map_err(corrupt)?),
        name: row.try_get("name").map_err(corrupt)?,
        gstin: gstin.as_deref().map(Gstin::parse).transpose().map_err(corrupt)?,
        address: row.try_get("address").map_err(corrupt)?,
        email: row.try_get("email").map_err(corrupt)?,
        phone: row.try_get("phone").map_err(corrupt)?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
    })
}

fn item_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<InvoiceItem> {
    let line_no: i32 = row.try_get("line_no").map_err(corrupt)?;
    Ok(InvoiceItem {
        line_no: u32::try_from(line_no).map_err(corrupt)?,
        line: LineItemResult {
            description: row.try_get("description").map_err(corrupt)?,
            hsn: row.try_get("hsn").map_err(corrupt)?,
            quantity: row.try_get("quantity").map_err(corrupt)?,
            rate: row.try_get("rate").map_err(corrupt)?,
            gst_rate: row.try_get("gst_rate").map_err(corrupt)?,
            amount: row.try_get("amount").map_err(corrupt)?,
            tax_amount: row.try_get("tax_amount").map_err(corrupt)?,
            cgst: row.try_get("cgst").map_err(corrupt)?,
            sgst: row.try_get("sgst").map_err(corrupt)?,
            igst: row.try_get("igst").map_err(corrupt)?,
        },
    })
}

#[derive(Debug)]
struct InvoiceHeaderRow {
    id: Uuid,
    client_id: Uuid,
    customer_id: Uuid,
    number: String,
    date: NaiveDate,
    due_date: Option<NaiveDate>,
    place_of_supply: Option<String>,
    supply_type: String,
    status: String,
    is_b2c: bool,
    subtotal: Decimal,
    tax_total: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for InvoiceHeaderRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(InvoiceHeaderRow {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            customer_id: row.try_get("customer_id")?,
            number: row.try_get("number")?,
            date: row.try_get("date")?,
            due_date: row.try_get("due_date")?,
            place_of_supply: row.try_get("place_of_supply")?,
            supply_type: row.try_get("supply_type")?,
            status: row.try_get("status")?,
            is_b2c: row.try_get("is_b2c")?,
            subtotal: row.try_get("subtotal")?,
            tax_total: row.try_get("tax_total")?,
            total: row.try_get("total")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl InvoiceHeaderRow {
    fn into_invoice(self, items: Vec<InvoiceItem>) -> StoreResult<Invoice> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(self.id),
            client_id: ClientId::from_uuid(self.client_id),
            customer_id: CustomerId::from_uuid(self.customer_id),
            number: InvoiceNumber::parse(&self.number).map_err(corrupt)?,
            date: self.date,
            due_date: self.due_date,
            place_of_supply: self.place_of_supply,
            supply_type: self.supply_type.parse().map_err(corrupt)?,
            status: self.status.parse().map_err(corrupt)?,
            is_b2c: self.is_b2c,
            items,
            totals: InvoiceTotals {
                subtotal: self.subtotal,
                tax_total: self.tax_total,
                total: self.total,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const INVOICE_COLUMNS: &str = "id, client_id, customer_id, number, date, due_date, place_of_supply, \
     supply_type, status, is_b2c, subtotal, tax_total, total, created_at, updated_at";

async fn write_items(tx: &mut Transaction<'_, Postgres>, invoice: &Invoice) -> StoreResult<()> {
    sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
        .bind(invoice.id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete_items", e))?;

    for item in &invoice.items {
        let line_no = i32::try_from(item.line_no)
            .map_err(|_| StoreError::Backend(format!("line number {} out of range", item.line_no)))?;
        let line = &item.line;
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                invoice_id, line_no, description, hsn, quantity, rate, gst_rate,
                amount, tax_amount, cgst, sgst, igst
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(line_no)
        .bind(&line.description)
        .bind(&line.hsn)
        .bind(line.quantity)
        .bind(line.rate)
        .bind(line.gst_rate)
        .bind(line.amount)
        .bind(line.tax_amount)
        .bind(line.cgst)
        .bind(line.sgst)
        .bind(line.igst)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
    }
    Ok(())
}

#[async_trait]
impl ClientStore for PostgresStore {
    #[instrument(skip(self), fields(owner = %owner), err)]
    async fn list_clients(&self, owner: UserId) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query("SELECT * FROM clients WHERE owner_id = $1 ORDER BY created_at")
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_clients", e))?;
        rows.iter().map(client_from_row).collect()
    }

    #[instrument(skip(self), fields(client_id = %id), err)]
    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_client", e))?;
        row.as_ref().map(client_from_row).transpose()
    }

    #[instrument(skip(self, client), fields(client_id = %client.id), err)]
    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (
                id, owner_id, name, gstin, address, invoice_prefix, bank_details, logo_url, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(client.owner.as_uuid())
        .bind(&client.name)
        .bind(client.gstin.as_str())
        .bind(&client.address)
        .bind(&client.invoice_prefix)
        .bind(&client.bank_details)
        .bind(&client.logo_url)
        .bind(client.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_client", e))?;
        Ok(())
    }

    #[instrument(skip(self, client), fields(client_id = %client.id), err)]
    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET name = $2, gstin = $3, address = $4, invoice_prefix = $5,
                bank_details = $6, logo_url = $7
            WHERE id = $1
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(&client.name)
        .bind(client.gstin.as_str())
        .bind(&client.address)
        .bind(&client.invoice_prefix)
        .bind(&client.bank_details)
        .bind(&client.logo_url)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_client", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(client_id = %id), err)]
    async fn delete_client(&self, id: ClientId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_client", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for PostgresStore {
    #[instrument(skip(self), fields(client_id = %client_id), err)]
    async fn list_customers(&self, client_id: ClientId) -> StoreResult<Vec<Customer>> {
        let rows = sqlx::query("SELECT * FROM customers WHERE client_id = $1 ORDER BY name")
            .bind(client_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_customers", e))?;
        rows.iter().map(customer_from_row).collect()
    }

    #[instrument(skip(self), fields(client_id = %client_id, customer_id = %id), err)]
    async fn get_customer(&self, client_id: ClientId, id: CustomerId) -> StoreResult<Option<Customer>> {
        let row = sqlx::query("SELECT * FROM customers WHERE client_id = $1 AND id = $2")
            .bind(client_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_customer", e))?;
        row.as_ref().map(customer_from_row).transpose()
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id), err)]
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, client_id, name, gstin, address, email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(customer.client_id.as_uuid())
        .bind(&customer.name)
        .bind(customer.gstin.as_ref().map(Gstin::as_str))
        .bind(&customer.address)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id), err)]
    async fn update_customer(&self, customer: &Customer) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = $3, gstin = $4, address = $5, email = $6, phone = $7
            WHERE client_id = $1 AND id = $2
            "#,
        )
        .bind(customer.client_id.as_uuid())
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(customer.gstin.as_ref().map(Gstin::as_str))
        .bind(&customer.address)
        .bind(&customer.email)
        .bind(&customer.phone)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(client_id = %client_id, customer_id = %id), err)]
    async fn delete_customer(&self, client_id: ClientId, id: CustomerId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE client_id = $1 AND id = $2")
            .bind(client_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_customer", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for PostgresStore {
    #[instrument(skip(self), fields(client_id = %client_id), err)]
    async fn list_invoices(&self, client_id: ClientId) -> StoreResult<Vec<Invoice>> {
        let headers: Vec<InvoiceHeaderRow> = sqlx::query_as(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE client_id = $1 ORDER BY date DESC, created_at DESC"
        ))
        .bind(client_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;
        self.hydrate(headers).await
    }

    #[instrument(skip(self), fields(client_id = %client_id, invoice_id = %id), err)]
    async fn get_invoice(&self, client_id: ClientId, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        let header: Option<InvoiceHeaderRow> = sqlx::query_as(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE client_id = $1 AND id = $2"
        ))
        .bind(client_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_invoice", e))?;

        match header {
            Some(h) => Ok(self.hydrate(vec![h]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(client_id = %client_id), err)]
    async fn count_invoices(&self, client_id: ClientId) -> StoreResult<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM invoices WHERE client_id = $1")
            .bind(client_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_invoices", e))?
            .try_get("n")
            .map_err(corrupt)?;
        u64::try_from(count).map_err(corrupt)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, number = %invoice.number), err)]
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, client_id, customer_id, number, date, due_date, place_of_supply,
                supply_type, status, is_b2c, subtotal, tax_total, total, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.client_id.as_uuid())
        .bind(invoice.customer_id.as_uuid())
        .bind(invoice.number.as_str())
        .bind(invoice.date)
        .bind(invoice.due_date)
        .bind(&invoice.place_of_supply)
        .bind(invoice.supply_type.as_str())
        .bind(invoice.status.as_str())
        .bind(invoice.is_b2c)
        .bind(invoice.totals.subtotal)
        .bind(invoice.totals.tax_total)
        .bind(invoice.totals.total)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        write_items(&mut tx, invoice).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id), err)]
    async fn replace_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET customer_id = $3, number = $4, date = $5, due_date = $6, place_of_supply = $7,
                supply_type = $8, status = $9, is_b2c = $10, subtotal = $11, tax_total = $12,
                total = $13, updated_at = $14
            WHERE client_id = $1 AND id = $2
            "#,
        )
        .bind(invoice.client_id.as_uuid())
        .bind(invoice.id.as_uuid())
        .bind(invoice.customer_id.as_uuid())
        .bind(invoice.number.as_str())
        .bind(invoice.date)
        .bind(invoice.due_date)
        .bind(&invoice.place_of_supply)
        .bind(invoice.supply_type.as_str())
        .bind(invoice.status.as_str())
        .bind(invoice.is_b2c)
        .bind(invoice.totals.subtotal)
        .bind(invoice.totals.tax_total)
        .bind(invoice.totals.total)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_invoice", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        write_items(&mut tx, invoice).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(client_id = %client_id, invoice_id = %id), err)]
    async fn delete_invoice(&self, client_id: ClientId, id: InvoiceId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE client_id = $1 AND id = $2")
            .bind(client_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

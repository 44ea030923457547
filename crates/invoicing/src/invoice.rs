use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use gstbook_core::{ClientId, CustomerId, DomainError, DomainResult, Entity, InvoiceId, ValidationError};
use gstbook_parties::{Client, Customer};
use gstbook_tax::{compute_totals, InvoiceComputation, InvoiceTotals, LineItemInput, LineItemResult, SupplyType};

use crate::number::InvoiceNumber;
use crate::payload::{InvoiceDraft, InvoicePatch};
use crate::supply::resolve_supply_type;

/// Days until payment is due when an invoice doesn't say.
pub const DEFAULT_PAYMENT_TERM_DAYS: u64 = 15;

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// `Paid` and `Cancelled` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// `Draft -> Sent -> Paid`, and `Draft | Sent -> Cancelled`.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Draft, Sent) | (Sent, Paid) | (Draft, Cancelled) | (Sent, Cancelled)
        )
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "cancelled" | "canceled" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("unknown invoice status '{other}'")),
        }
    }
}

/// A persisted invoice row: its position plus the engine's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// 1-based position on the invoice.
    pub line_no: u32,
    #[serde(flatten)]
    pub line: LineItemResult,
}

/// The client and customer an invoice is issued between.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceParties<'a> {
    pub client: &'a Client,
    pub customer: &'a Customer,
}

impl<'a> InvoiceParties<'a> {
    pub fn new(client: &'a Client, customer: &'a Customer) -> DomainResult<Self> {
        if customer.client_id != client.id {
            return Err(DomainError::validation("customer_id", "customer belongs to another client"));
        }
        Ok(Self { client, customer })
    }

    fn supply_type(
        &self,
        explicit: Option<SupplyType>,
        place_of_supply: Option<&str>,
    ) -> Result<SupplyType, ValidationError> {
        resolve_supply_type(
            explicit,
            self.client.state_code(),
            place_of_supply,
            self.customer.state_code(),
        )
    }
}

/// Aggregate root: Invoice (header + ordered items + derived totals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub client_id: ClientId,
    pub customer_id: CustomerId,
    pub number: InvoiceNumber,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub place_of_supply: Option<String>,
    pub supply_type: SupplyType,
    pub status: InvoiceStatus,
    pub is_b2c: bool,
    pub items: Vec<InvoiceItem>,
    pub totals: InvoiceTotals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn numbered(computation: InvoiceComputation) -> (Vec<InvoiceItem>, InvoiceTotals) {
    let items = computation
        .lines
        .into_iter()
        .zip(1u32..)
        .map(|(line, line_no)| InvoiceItem { line_no, line })
        .collect();
    (items, computation.totals)
}

fn ensure_due_after(date: NaiveDate, due_date: Option<NaiveDate>) -> DomainResult<()> {
    match due_date {
        Some(due) if due < date => Err(DomainError::validation(
            "due_date",
            "must not be before the invoice date",
        )),
        _ => Ok(()),
    }
}

impl Invoice {
    /// Build a new invoice from a validated draft.
    ///
    /// Line amounts, tax splits and totals are computed here; whatever totals
    /// the client submitted are ignored. `default_number` is used when the
    /// draft carries no number of its own.
    pub fn create(
        id: InvoiceId,
        parties: InvoiceParties<'_>,
        draft: InvoiceDraft,
        default_number: InvoiceNumber,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if parties.customer.id != draft.customer_id {
            return Err(DomainError::validation("customer_id", "does not match the invoiced customer"));
        }
        if !matches!(draft.status, InvoiceStatus::Draft | InvoiceStatus::Sent) {
            return Err(DomainError::validation(
                "status",
                "a new invoice must start as draft or sent",
            ));
        }

        let due_date = draft
            .due_date
            .or_else(|| draft.date.checked_add_days(Days::new(DEFAULT_PAYMENT_TERM_DAYS)));
        ensure_due_after(draft.date, due_date)?;

        let supply_type = parties.supply_type(draft.supply_type, draft.place_of_supply.as_deref())?;
        let (items, totals) = numbered(compute_totals(&draft.items, supply_type)?);

        Ok(Self {
            id,
            client_id: parties.client.id,
            customer_id: parties.customer.id,
            number: draft.number.unwrap_or(default_number),
            date: draft.date,
            due_date,
            place_of_supply: draft.place_of_supply,
            supply_type,
            status: draft.status,
            is_b2c: draft.is_b2c.unwrap_or_else(|| parties.customer.is_b2c()),
            items,
            totals,
            created_at: now,
            updated_at: now,
        })
    }

    /// The line inputs the current items were computed from.
    pub fn line_inputs(&self) -> Vec<LineItemInput> {
        self.items.iter().map(|item| item.line.input()).collect()
    }

    /// Apply an update.
    ///
    /// Only drafts accept content changes. New items replace the old ones
    /// wholesale; a change that affects the supply type recomputes the
    /// existing items. The status change, if any, is checked last so a draft
    /// can be edited and sent in one update. `parties` must reflect the
    /// patched customer when the patch changes it.
    pub fn revise(
        &mut self,
        patch: InvoicePatch,
        parties: InvoiceParties<'_>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if parties.client.id != self.client_id {
            return Err(DomainError::invariant("client mismatch"));
        }
        let customer_id = patch.customer_id.unwrap_or(self.customer_id);
        if parties.customer.id != customer_id {
            return Err(DomainError::validation("customer_id", "does not match the invoiced customer"));
        }

        if patch.edits_content() && self.status != InvoiceStatus::Draft {
            return Err(DomainError::invariant(format!(
                "cannot edit a {} invoice; only drafts can be changed",
                self.status
            )));
        }
        if let Some(next) = patch.status {
            if next != self.status && !self.status.can_transition_to(next) {
                return Err(DomainError::invariant(format!(
                    "cannot move invoice from {} to {}",
                    self.status, next
                )));
            }
        }

        let date = patch.date.unwrap_or(self.date);
        let due_date = patch.due_date.unwrap_or(self.due_date);
        ensure_due_after(date, due_date)?;

        let place_of_supply = patch.place_of_supply.clone().unwrap_or_else(|| self.place_of_supply.clone());
        let location_changed = patch.place_of_supply.is_some() || patch.customer_id.is_some();
        let supply_type = match patch.supply_type {
            Some(explicit) => explicit,
            None if location_changed => parties.supply_type(None, place_of_supply.as_deref())?,
            None => self.supply_type,
        };

        let recomputed = if patch.items.is_some() || supply_type != self.supply_type {
            let inputs = patch.items.unwrap_or_else(|| self.line_inputs());
            Some(numbered(compute_totals(&inputs, supply_type)?))
        } else {
            None
        };

        // Everything validated; apply.
        if let Some((items, totals)) = recomputed {
            self.items = items;
            self.totals = totals;
        }
        if let Some(number) = patch.number {
            self.number = number;
        }
        if let Some(is_b2c) = patch.is_b2c {
            self.is_b2c = is_b2c;
        } else if patch.customer_id.is_some() {
            self.is_b2c = parties.customer.is_b2c();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.customer_id = customer_id;
        self.date = date;
        self.due_date = due_date;
        self.place_of_supply = place_of_supply;
        self.supply_type = supply_type;
        self.updated_at = now;
        Ok(())
    }
}

/// Live totals for an invoice being edited.
///
/// Same engine, same rounding as [`Invoice::create`], so the preview always
/// matches what gets saved.
pub fn preview(items: &[LineItemInput], supply: SupplyType) -> Result<InvoiceComputation, ValidationError> {
    compute_totals(items, supply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstbook_core::UserId;
    use gstbook_parties::{validate_client, validate_customer, ClientPayload, CustomerPayload};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_client() -> Client {
        let new = validate_client(ClientPayload {
            name: Some("Sharma Traders".to_string()),
            gstin: Some("27AAPFU0939F1ZV".to_string()),
            address: Some("Pune, Maharashtra".to_string()),
            ..ClientPayload::default()
        })
        .unwrap();
        Client::register(ClientId::new(), UserId::new(), new, test_time())
    }

    fn test_customer(client: &Client, gstin: Option<&str>) -> Customer {
        let new = validate_customer(CustomerPayload {
            name: Some("Customer".to_string()),
            gstin: gstin.map(str::to_string),
            ..CustomerPayload::default()
        })
        .unwrap();
        Customer::register(CustomerId::new(), client.id, new, test_time())
    }

    fn item(quantity: Decimal, rate: Decimal, gst_rate: Decimal) -> LineItemInput {
        LineItemInput {
            description: "Service".to_string(),
            hsn: None,
            quantity,
            rate,
            gst_rate,
        }
    }

    fn draft(customer: &Customer, items: Vec<LineItemInput>) -> InvoiceDraft {
        InvoiceDraft {
            customer_id: customer.id,
            number: None,
            date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            due_date: None,
            place_of_supply: None,
            supply_type: None,
            status: InvoiceStatus::Draft,
            is_b2c: None,
            items,
            submitted_totals: None,
        }
    }

    fn number(seq: u64) -> InvoiceNumber {
        InvoiceNumber::next("INV-", seq).unwrap()
    }

    fn create(client: &Client, customer: &Customer, d: InvoiceDraft) -> Invoice {
        let parties = InvoiceParties::new(client, customer).unwrap();
        Invoice::create(InvoiceId::new(), parties, d, number(1), test_time()).unwrap()
    }

    #[test]
    fn create_computes_intra_state_invoice_for_same_state_customer() {
        let client = test_client();
        let customer = test_customer(&client, Some("27AAPFU0939F1ZV"));
        let invoice = create(&client, &customer, draft(&customer, vec![item(dec!(2), dec!(500), dec!(18))]));

        assert_eq!(invoice.supply_type, SupplyType::IntraState);
        assert_eq!(invoice.items[0].line_no, 1);
        assert_eq!(invoice.items[0].line.cgst, dec!(90.00));
        assert_eq!(invoice.items[0].line.sgst, dec!(90.00));
        assert_eq!(invoice.totals.total, dec!(1180.00));
        assert_eq!(invoice.number.as_str(), "INV-0001");
        assert!(!invoice.is_b2c);
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2026, 4, 16));
    }

    #[test]
    fn create_uses_igst_for_out_of_state_customer() {
        let client = test_client();
        let customer = test_customer(&client, Some("29AAGCB7383J1Z4"));
        let invoice = create(
            &client,
            &customer,
            draft(
                &customer,
                vec![item(dec!(1), dec!(100), dec!(5)), item(dec!(3), dec!(33.33), dec!(12))],
            ),
        );

        assert_eq!(invoice.supply_type, SupplyType::InterState);
        assert_eq!(invoice.items[1].line_no, 2);
        assert_eq!(invoice.items[1].line.igst, dec!(12.00));
        assert_eq!(invoice.totals.subtotal, dec!(199.99));
        assert_eq!(invoice.totals.tax_total, dec!(17.00));
        assert_eq!(invoice.totals.total, dec!(216.99));
    }

    #[test]
    fn create_ignores_submitted_totals() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let mut d = draft(&customer, vec![item(dec!(2), dec!(500), dec!(18))]);
        d.submitted_totals = Some(crate::payload::SubmittedTotals {
            subtotal: Some(dec!(1)),
            tax_total: Some(dec!(1)),
            total: Some(dec!(2)),
        });
        let invoice = create(&client, &customer, d);
        assert_eq!(invoice.totals.total, dec!(1180.00));
        assert!(invoice.is_b2c);
    }

    #[test]
    fn create_keeps_explicit_number_and_supply() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let mut d = draft(&customer, vec![item(dec!(1), dec!(100), dec!(18))]);
        d.number = Some(InvoiceNumber::parse("SH/0042").unwrap());
        d.supply_type = Some(SupplyType::InterState);
        let invoice = create(&client, &customer, d);
        assert_eq!(invoice.number.as_str(), "SH/0042");
        assert_eq!(invoice.items[0].line.igst, dec!(18.00));
    }

    #[test]
    fn create_rejects_invalid_lines_and_due_dates() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let parties = InvoiceParties::new(&client, &customer).unwrap();

        let err = Invoice::create(
            InvoiceId::new(),
            parties,
            draft(&customer, vec![item(dec!(0), dec!(100), dec!(18))]),
            number(1),
            test_time(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(v) => assert_eq!(v.field, "items.0.quantity"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut d = draft(&customer, vec![item(dec!(1), dec!(100), dec!(18))]);
        d.due_date = NaiveDate::from_ymd_opt(2026, 3, 1);
        let err = Invoice::create(InvoiceId::new(), parties, d, number(1), test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(v) if v.field == "due_date"));
    }

    #[test]
    fn parties_must_belong_together() {
        let client = test_client();
        let other = test_client();
        let customer = test_customer(&other, None);
        assert!(InvoiceParties::new(&client, &customer).is_err());
    }

    #[test]
    fn revise_replaces_items_wholesale() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let mut invoice = create(
            &client,
            &customer,
            draft(&customer, vec![item(dec!(1), dec!(100), dec!(18)), item(dec!(1), dec!(50), dec!(5))]),
        );

        let patch = InvoicePatch {
            items: Some(vec![item(dec!(4), dec!(25), dec!(12))]),
            ..InvoicePatch::default()
        };
        invoice
            .revise(patch, InvoiceParties::new(&client, &customer).unwrap(), test_time())
            .unwrap();

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.totals.subtotal, dec!(100.00));
        assert_eq!(invoice.totals.tax_total, dec!(12.00));
        assert_eq!(invoice.totals.total, dec!(112.00));
    }

    #[test]
    fn revise_recomputes_existing_items_when_supply_changes() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let mut invoice = create(&client, &customer, draft(&customer, vec![item(dec!(2), dec!(500), dec!(18))]));
        assert_eq!(invoice.items[0].line.cgst, dec!(90.00));

        let patch = InvoicePatch {
            place_of_supply: Some(Some("Chennai, Tamil Nadu".to_string())),
            ..InvoicePatch::default()
        };
        invoice
            .revise(patch, InvoiceParties::new(&client, &customer).unwrap(), test_time())
            .unwrap();

        assert_eq!(invoice.supply_type, SupplyType::InterState);
        assert_eq!(invoice.items[0].line.igst, dec!(180.00));
        assert_eq!(invoice.items[0].line.cgst, dec!(0));
        assert_eq!(invoice.totals.total, dec!(1180.00));
    }

    #[test]
    fn status_follows_lifecycle() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let mut invoice = create(&client, &customer, draft(&customer, vec![item(dec!(1), dec!(10), dec!(5))]));
        let parties = InvoiceParties::new(&client, &customer).unwrap();

        let to = |status| InvoicePatch {
            status: Some(status),
            ..InvoicePatch::default()
        };

        let err = invoice.revise(to(InvoiceStatus::Paid), parties, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        invoice.revise(to(InvoiceStatus::Sent), parties, test_time()).unwrap();
        invoice.revise(to(InvoiceStatus::Paid), parties, test_time()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.status.is_terminal());

        let err = invoice.revise(to(InvoiceStatus::Cancelled), parties, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn sent_invoices_cannot_be_edited() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let mut d = draft(&customer, vec![item(dec!(1), dec!(10), dec!(5))]);
        d.status = InvoiceStatus::Sent;
        let mut invoice = create(&client, &customer, d);
        let before = invoice.clone();

        let patch = InvoicePatch {
            items: Some(vec![item(dec!(9), dec!(10), dec!(5))]),
            ..InvoicePatch::default()
        };
        let err = invoice
            .revise(patch, InvoiceParties::new(&client, &customer).unwrap(), test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("only drafts")));
        assert_eq!(invoice, before);
    }

    #[test]
    fn failed_revision_leaves_invoice_untouched() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let mut invoice = create(&client, &customer, draft(&customer, vec![item(dec!(1), dec!(10), dec!(5))]));
        let before = invoice.clone();

        let patch = InvoicePatch {
            number: Some(InvoiceNumber::parse("NEW-1").unwrap()),
            items: Some(vec![item(dec!(1), dec!(-10), dec!(5))]),
            ..InvoicePatch::default()
        };
        assert!(invoice
            .revise(patch, InvoiceParties::new(&client, &customer).unwrap(), test_time())
            .is_err());
        assert_eq!(invoice, before);
    }

    #[test]
    fn preview_matches_persisted_totals() {
        let client = test_client();
        let customer = test_customer(&client, None);
        let items = vec![item(dec!(3), dec!(33.33), dec!(12)), item(dec!(7), dec!(0.99), dec!(28))];
        let invoice = create(&client, &customer, draft(&customer, items.clone()));
        let preview = preview(&items, invoice.supply_type).unwrap();
        assert_eq!(preview.totals, invoice.totals);
        let lines: Vec<_> = invoice.items.iter().map(|i| i.line.clone()).collect();
        assert_eq!(preview.lines, lines);
    }

    #[test]
    fn terminal_statuses_accept_no_transition() {
        use InvoiceStatus::*;
        for from in [Paid, Cancelled] {
            assert!(from.is_terminal());
            for next in [Draft, Sent, Paid, Cancelled] {
                assert!(!from.can_transition_to(next), "{from} -> {next}");
            }
        }
        assert!(!Draft.is_terminal());
        assert!(!Sent.is_terminal());
    }

    fn line_input() -> impl Strategy<Value = LineItemInput> {
        ((1i64..10_000, 0u32..=3), (0i64..1_000_000, 0u32..=2), prop::sample::select(vec![0u32, 3, 5, 12, 18, 28]))
            .prop_map(|((qm, qs), (rm, rs), gst)| {
                item(Decimal::new(qm, qs), Decimal::new(rm, rs), Decimal::from(gst))
            })
    }

    fn supply_type() -> impl Strategy<Value = SupplyType> {
        prop_oneof![Just(SupplyType::IntraState), Just(SupplyType::InterState)]
    }

    proptest! {
        /// Stored totals always equal a fresh engine run over the stored lines.
        #[test]
        fn created_totals_match_engine(
            items in prop::collection::vec(line_input(), 1..12),
            supply in supply_type(),
        ) {
            let client = test_client();
            let customer = test_customer(&client, None);
            let mut d = draft(&customer, items);
            d.supply_type = Some(supply);
            let invoice = create(&client, &customer, d);

            let fresh = compute_totals(&invoice.line_inputs(), invoice.supply_type).unwrap();
            prop_assert_eq!(invoice.supply_type, supply);
            prop_assert_eq!(&invoice.totals, &fresh.totals);
            let lines: Vec<_> = invoice.items.iter().map(|i| i.line.clone()).collect();
            prop_assert_eq!(lines, fresh.lines);
        }

        #[test]
        fn revised_totals_match_engine(
            first in prop::collection::vec(line_input(), 1..8),
            second in prop::option::of(prop::collection::vec(line_input(), 1..8)),
            supply in supply_type(),
        ) {
            let client = test_client();
            let customer = test_customer(&client, None);
            let mut invoice = create(&client, &customer, draft(&customer, first));

            let patch = InvoicePatch {
                supply_type: Some(supply),
                items: second,
                ..InvoicePatch::default()
            };
            let parties = InvoiceParties::new(&client, &customer).unwrap();
            invoice.revise(patch, parties, test_time()).unwrap();

            let fresh = compute_totals(&invoice.line_inputs(), supply).unwrap();
            prop_assert_eq!(invoice.supply_type, supply);
            prop_assert_eq!(&invoice.totals, &fresh.totals);
            prop_assert!(invoice.items.iter().enumerate().all(|(i, item)| item.line_no as usize == i + 1));
        }
    }
}

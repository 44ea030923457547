//! Deciding intra- vs inter-state supply for an invoice.

use gstbook_core::ValidationError;
use gstbook_parties::StateCode;
use gstbook_tax::SupplyType;

/// Decide the supply type for an invoice.
///
/// An explicit choice wins. Otherwise the place of supply is resolved to a
/// state and compared with the supplier's registered state; without a place
/// of supply the customer's GSTIN state is used. With nothing to compare
/// (an unregistered customer and no place of supply) the sale is local.
pub fn resolve_supply_type(
    explicit: Option<SupplyType>,
    supplier_state: StateCode,
    place_of_supply: Option<&str>,
    customer_state: Option<StateCode>,
) -> Result<SupplyType, ValidationError> {
    if let Some(supply) = explicit {
        return Ok(supply);
    }

    let place = place_of_supply.map(str::trim).filter(|p| !p.is_empty());
    if let Some(place) = place {
        let state = StateCode::parse_place(place).ok_or_else(|| {
            ValidationError::new(
                "place_of_supply",
                "is not a recognised state name or GST state code",
            )
        })?;
        return Ok(SupplyType::between(supplier_state, state));
    }

    Ok(customer_state
        .map(|state| SupplyType::between(supplier_state, state))
        .unwrap_or(SupplyType::IntraState))
}

//! Currency rounding.

use rust_decimal::{Decimal, RoundingStrategy};

/// Minor-unit precision of INR amounts (paise).
pub const CURRENCY_DECIMAL_PLACES: u32 = 2;

/// Largest amount a line figure or invoice total may reach: 999,999,999,999.99,
/// the range of a `NUMERIC(14, 2)` money column.
pub fn max_currency_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, CURRENCY_DECIMAL_PLACES)
}

/// Round to currency precision, half away from zero (commercial rounding).
///
/// The result always carries exactly two decimal places (`1000` -> `1000.00`).
#[inline]
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(CURRENCY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_DECIMAL_PLACES);
    rounded
}

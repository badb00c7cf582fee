//! Prices are persisted as integer minor units and exposed as 2-place decimals.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub fn to_cents(amount: Decimal) -> Option<i64> {
    (round(amount) * Decimal::ONE_HUNDRED).to_i64()
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whole and two-digit fractional parts, e.g. `12.5` → `("12", "50")`.
///
/// The split happens on whatever separator the two-place rendering produced,
/// so the parts never depend on locale.
pub fn split(amount: Decimal) -> (String, String) {
    let rendered = format!("{:.2}", round(amount));
    match rendered.rsplit_once(['.', ',']) {
        Some((whole, fraction)) => (whole.to_string(), fraction.to_string()),
        None => (rendered, "00".to_string()),
    }
}

/// Decimal-comma rendering: `1234.5` → `"1234,50"`.
pub fn format_comma(amount: Decimal) -> String {
    let (whole, fraction) = split(amount);
    format!("{whole},{fraction}")
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Half-open interval intersection: `[a_start, a_end)` meets
/// `[b_start, b_end)` iff `a_start < b_end && b_start < a_end`. Back-to-back
/// stays (one checking out the day the next checks in) do not overlap.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whole nights between check-in and check-out. Caller guarantees
/// `check_in < check_out`.
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

/// Total stay price: nights x nightly rate, exact decimal arithmetic.
pub fn stay_price(price_per_night: Decimal, nights: i64) -> Decimal {
    price_per_night * Decimal::from(nights)
}

/// Result of an availability check, including the derived quote.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityQuote {
    pub available: bool,
    pub nights: i64,
    pub total_price: Decimal,
    pub currency: String,
    pub property: PropertySummary,
}

/// The slice of a property listing a quote needs to carry.
#[derive(Debug, Clone, Serialize)]
pub struct PropertySummary {
    pub id: uuid::Uuid,
    pub name: String,
    pub price_per_night: Decimal,
    pub currency: String,
}

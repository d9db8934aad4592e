//! Monetary values as integer cents.
//!
//! All arithmetic happens on `i64` cents so totals are exact; `Decimal` is
//! only used to render 2-decimal amounts at the API boundary.

use rust_decimal::Decimal;

/// Render an amount of cents as a 2-decimal string, e.g. `2550` -> `"25.50"`.
pub fn format_cents(cents: i64) -> String {
    Decimal::new(cents, 2).to_string()
}

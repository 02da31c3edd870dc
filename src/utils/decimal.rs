//! Decimal formatting utilities for notifications and logs.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round half away from zero to `decimals` places.
pub fn round_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Format with an explicit sign and a fixed number of decimals, e.g. `+12.30`.
pub fn format_signed(value: Decimal, decimals: u32) -> String {
    let rounded = round_to_precision(value, decimals);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        "+"
    };
    format!("{}{:.*}", sign, decimals as usize, rounded.abs())
}

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Round a money amount to fen (2 dp), half-up
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Fixed two-decimal rendering of an amount, rounded half-up first
pub fn display_amount(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}

pub fn display_yuan(amount: Decimal) -> String {
    format!("¥{}", display_amount(amount))
}

/// Rate as a whole-ish percentage, e.g. 0.03 -> "3%", 0.035 -> "3.5%"
pub fn display_rate(rate: Decimal) -> String {
    format!("{}%", (rate * dec!(100)).normalize())
}

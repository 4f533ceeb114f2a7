//! Money helpers. All stakes, totals and payouts carry two decimals.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to 2 decimals, half-up (ties away from zero)
pub fn q2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest amount a `NUMERIC(16, 2)` money column holds
pub fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999_999_999, 2)
}

/// Sum a set of amounts, each rounded to 2 decimals before adding.
/// `None` when the total overflows or exceeds `max_amount()`.
pub fn sum_q2<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let total = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(q2(amount)))?;
    Some(q2(total)).filter(|t| *t <= max_amount())
}

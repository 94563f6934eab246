//! Rounding policy
//!
//! Computed weights are rounded to the nearest loadable increment exactly
//! once, after all percentage math. Ties round up.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round `weight` to the nearest multiple of `increment`. Ties round away
/// from zero (half-up for the positive weights this engine deals in). A
/// zero or negative increment leaves the weight untouched.
pub fn round_to_increment(weight: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return weight;
    }
    let steps = (weight / increment)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    (steps * increment).normalize()
}

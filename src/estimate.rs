//! One-rep-max estimation
//!
//! Feeds `MaxKind::EstimatedMax` from logged rep performances so athletes
//! without a tested single can still be prescribed percentage work.

use rust_decimal::Decimal;

/// Epley estimate: `weight * (1 + reps / 30)`. A single is returned as-is.
pub fn estimate_one_rep_max(weight: Decimal, reps: u32) -> Decimal {
    if reps <= 1 {
        return weight;
    }
    weight * (Decimal::ONE + Decimal::from(reps) / Decimal::from(30u32))
}

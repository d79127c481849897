//! Seeded pricing stub.
//!
//! Not a pricing model. The NPV is a deterministic pseudo-random value in
//! ±5 % of the notional, derived entirely from the caller-supplied seed:
//! the same seed against the same notional always yields the same NPV.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;

/// Computes the stub NPV for a trade.
///
/// The variation is drawn in whole basis points in `[-500, +500]` so the
/// notional scaling stays exact in decimal arithmetic; the result is rounded
/// to two decimal places.
pub fn seeded_npv(notional: Decimal, seed: u64) -> Decimal {
    let mut rng = StdRng::seed_from_u64(seed);
    let variation_bps: i64 = rng.random_range(-500..=500);
    (notional * Decimal::new(variation_bps, 4)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn same_seed_same_npv() {
        let notional = dec!(1_000_000);
        assert_eq!(seeded_npv(notional, 42), seeded_npv(notional, 42));
        assert_eq!(seeded_npv(notional, 0), seeded_npv(notional, 0));
    }

    #[test]
    fn different_seeds_vary() {
        let notional = dec!(1_000_000);
        let distinct: std::collections::HashSet<Decimal> =
            (0..50).map(|seed| seeded_npv(notional, seed)).collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn npv_stays_within_five_percent_of_notional() {
        let notional = dec!(1_000_000);
        let bound = dec!(50_000);
        for seed in 0..200 {
            let npv = seeded_npv(notional, seed);
            assert!(npv.abs() <= bound, "seed {seed} gave {npv}");
        }
    }

    #[test]
    fn npv_is_rounded_to_cents() {
        for seed in 0..50 {
            let npv = seeded_npv(dec!(1_234_567.89), seed);
            assert_eq!(npv, npv.round_dp(2));
        }
    }

    #[test]
    fn zero_notional_prices_to_zero() {
        assert_eq!(seeded_npv(Decimal::ZERO, 7), Decimal::ZERO);
    }
}

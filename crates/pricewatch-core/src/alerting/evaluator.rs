//! Trigger evaluation

use crate::models::{Alert, ComparisonKind};

/// Maximum distance from the threshold for a `cross` alert to fire
pub const CROSS_TOLERANCE: f64 = 0.01;

/// Whether `price` satisfies `kind` against `threshold`.
///
/// `cross` is a proximity test only: it has no memory of the side the price
/// approached from, so a price that jumps over the threshold between two
/// samples does not fire.
pub fn fires(kind: ComparisonKind, threshold: f64, price: f64) -> bool {
    match kind {
        ComparisonKind::Above => price >= threshold,
        ComparisonKind::Below => price <= threshold,
        ComparisonKind::Cross => (price - threshold).abs() < CROSS_TOLERANCE,
    }
}

impl Alert {
    /// Check if a price triggers this alert
    pub fn check(&self, price: f64) -> bool {
        fires(self.kind, self.threshold, price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(ComparisonKind::Above, 150.0, 151.0, true)]
    #[case(ComparisonKind::Above, 150.0, 150.0, true)]
    #[case(ComparisonKind::Above, 150.0, 149.99, false)]
    #[case(ComparisonKind::Below, 7000.0, 6999.5, true)]
    #[case(ComparisonKind::Below, 7000.0, 7000.0, true)]
    #[case(ComparisonKind::Below, 7000.0, 7000.01, false)]
    #[case(ComparisonKind::Cross, 100.0, 100.005, true)]
    #[case(ComparisonKind::Cross, 100.0, 99.995, true)]
    #[case(ComparisonKind::Cross, 100.0, 100.02, false)]
    #[case(ComparisonKind::Cross, 100.0, 105.0, false)]
    fn test_fires(
        #[case] kind: ComparisonKind,
        #[case] threshold: f64,
        #[case] price: f64,
        #[case] expected: bool,
    ) {
        assert_eq!(fires(kind, threshold, price), expected);
    }

    #[test]
    fn test_nan_price_never_fires() {
        for kind in ComparisonKind::ALL {
            assert!(!fires(kind, 100.0, f64::NAN));
        }
    }

    proptest! {
        #[test]
        fn prop_above_iff_at_or_over(threshold in -1e6f64..1e6, price in -1e6f64..1e6) {
            prop_assert_eq!(fires(ComparisonKind::Above, threshold, price), price >= threshold);
        }

        #[test]
        fn prop_below_iff_at_or_under(threshold in -1e6f64..1e6, price in -1e6f64..1e6) {
            prop_assert_eq!(fires(ComparisonKind::Below, threshold, price), price <= threshold);
        }

        #[test]
        fn prop_cross_iff_within_tolerance(threshold in -1e6f64..1e6, offset in -1.0f64..1.0) {
            let price = threshold + offset;
            prop_assert_eq!(
                fires(ComparisonKind::Cross, threshold, price),
                (price - threshold).abs() < CROSS_TOLERANCE
            );
        }

        #[test]
        fn prop_deterministic(threshold in -1e6f64..1e6, price in -1e6f64..1e6) {
            for kind in ComparisonKind::ALL {
                prop_assert_eq!(fires(kind, threshold, price), fires(kind, threshold, price));
            }
        }

        #[test]
        fn prop_above_or_below_always_holds(threshold in -1e6f64..1e6, price in -1e6f64..1e6) {
            prop_assert!(
                fires(ComparisonKind::Above, threshold, price)
                    || fires(ComparisonKind::Below, threshold, price)
            );
        }
    }
}

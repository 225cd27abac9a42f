#![forbid(unsafe_code)]

use pythia_kernel_contracts::signals::{
    SignalDimension, SignalDimensions, SIGNALS_BONUS_CAP, SIGNIFICANT_RELATIVE_CHANGE,
};
use pythia_kernel_contracts::weights::SignalMaxPoints;

/// Weighted sum of `dimension_i * max_points_i`, capped at 10.
pub fn compute_signals_bonus(dimensions: &SignalDimensions, max_points: &SignalMaxPoints) -> f64 {
    let raw = dimensions.founder_momentum * max_points.founder_momentum
        + dimensions.market_psychology * max_points.market_psychology
        + dimensions.narrative_fit * max_points.narrative_fit
        + dimensions.capital_convergence * max_points.capital_convergence
        + dimensions.timing * max_points.timing;
    raw.min(SIGNALS_BONUS_CAP).max(0.0)
}

/// Hysteresis rule: an observation is significant when any dimension moved at
/// least 50% relative to its stored value, or moved off a zero baseline.
pub fn significant_change(stored: &SignalDimensions, observed: &SignalDimensions) -> bool {
    SignalDimension::ALL.iter().any(|&dimension| {
        let old = stored.get(dimension);
        let new = observed.get(dimension);
        if old == 0.0 {
            new > 0.0
        } else {
            ((new - old) / old).abs() >= SIGNIFICANT_RELATIVE_CHANGE
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pythia_kernel_contracts::weights::SignalMaxPoints;

    fn max_points() -> SignalMaxPoints {
        SignalMaxPoints::v1(2.5, 2.5, 2.0, 1.5, 1.5).unwrap()
    }

    #[test]
    fn at_signals_01_bonus_is_weighted_sum() {
        let dims = SignalDimensions::v1(1.0, 0.0, 0.5, 0.0, 0.0).unwrap();
        let bonus = compute_signals_bonus(&dims, &max_points());
        assert!((bonus - 3.5).abs() < 1e-9);
    }

    #[test]
    fn at_signals_02_bonus_capped_at_ten() {
        let dims = SignalDimensions::v1(1.0, 1.0, 1.0, 1.0, 1.0).unwrap();
        let bonus = compute_signals_bonus(&dims, &max_points());
        assert!((bonus - 10.0).abs() < 1e-9);
    }

    #[test]
    fn at_signals_03_sub_threshold_movement_not_significant() {
        let stored = SignalDimensions::v1(0.40, 0.40, 0.40, 0.40, 0.40).unwrap();
        let observed = SignalDimensions::v1(0.59, 0.40, 0.40, 0.40, 0.40).unwrap();
        // 0.19 / 0.40 = 47.5% relative change.
        assert!(!significant_change(&stored, &observed));
    }

    #[test]
    fn at_signals_04_half_relative_movement_is_significant() {
        let stored = SignalDimensions::v1(0.40, 0.40, 0.40, 0.40, 0.40).unwrap();
        let observed = SignalDimensions::v1(0.60, 0.40, 0.40, 0.40, 0.40).unwrap();
        assert!(significant_change(&stored, &observed));
    }

    #[test]
    fn at_signals_05_zero_baseline_transition_is_significant() {
        let stored = SignalDimensions::v1(0.0, 0.40, 0.40, 0.40, 0.40).unwrap();
        let observed = SignalDimensions::v1(0.05, 0.40, 0.40, 0.40, 0.40).unwrap();
        assert!(significant_change(&stored, &observed));
    }
}

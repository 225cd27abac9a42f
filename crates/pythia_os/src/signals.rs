#![forbid(unsafe_code)]

//! Hysteresis-gated signal tracker. Stored state only moves on significant
//! observations; noise-level wobble leaves both the dimensions and the bonus
//! untouched.

use pythia_engines::signals::{compute_signals_bonus, significant_change};
use pythia_kernel_contracts::signals::{SignalDimensions, SignalStateRecord};
use pythia_kernel_contracts::{MonotonicTimeNs, StartupId, Validate};
use pythia_storage::{PythiaStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalUpdateReport {
    pub changed: bool,
    pub signals_bonus: f64,
}

/// Apply one observation. The first observation for a startup always writes;
/// afterwards state moves only when some dimension shifts by the significance
/// threshold relative to the stored value. The bonus is recomputed from the
/// runtime-effective version's signal max points.
pub fn update_if_significant(
    store: &mut PythiaStore,
    startup_id: StartupId,
    observed: SignalDimensions,
    now: MonotonicTimeNs,
) -> Result<SignalUpdateReport, StorageError> {
    observed.validate()?;
    let effective = store
        .runtime_config_row()
        .map(|config| config.effective_version().clone())
        .ok_or(StorageError::ForeignKeyViolation {
            table: "runtime_config",
            key: "singleton".to_string(),
        })?;
    let version = store.weight_version_row(&effective).ok_or_else(|| {
        StorageError::ForeignKeyViolation {
            table: "weight_versions",
            key: effective.as_str().to_string(),
        }
    })?;
    let max_points = version.weights.signal_max_points;

    if let Some(state) = store.signal_state_row(&startup_id) {
        if !significant_change(&state.dimensions, &observed) {
            return Ok(SignalUpdateReport {
                changed: false,
                signals_bonus: state.signals_bonus,
            });
        }
    }

    let bonus = compute_signals_bonus(&observed, &max_points);
    let record = SignalStateRecord::v1(startup_id, observed, bonus, now)?;
    store.upsert_signal_state_row(record)?;
    Ok(SignalUpdateReport {
        changed: true,
        signals_bonus: bonus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{runtime_config, version_store};
    use pythia_kernel_contracts::weights::{
        ComponentWeights, SignalMaxPoints, SignalsContractVersion, WeightSet, WeightsVersionId,
    };

    fn store_with_active() -> PythiaStore {
        let mut store = PythiaStore::new_in_memory();
        version_store::create_version(
            &mut store,
            WeightsVersionId::new("v1").unwrap(),
            WeightSet::v1(
                ComponentWeights::v1(0.30, 0.25, 0.20, 0.15, 0.10).unwrap(),
                SignalMaxPoints::v1(2.5, 2.5, 2.0, 1.5, 1.5).unwrap(),
                10.0,
                35.0,
                5.0,
                1.0,
                SignalsContractVersion(1),
            )
            .unwrap(),
            "ops_admin".to_string(),
            "seed".to_string(),
            MonotonicTimeNs(1),
        )
        .unwrap();
        runtime_config::set_active(
            &mut store,
            WeightsVersionId::new("v1").unwrap(),
            MonotonicTimeNs(2),
        )
        .unwrap();
        store
    }

    fn startup() -> StartupId {
        StartupId::new("su_1").unwrap()
    }

    #[test]
    fn at_signal_track_01_first_observation_always_writes() {
        let mut store = store_with_active();
        let report = update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.8, 0.4, 0.5, 0.2, 0.6).unwrap(),
            MonotonicTimeNs(100),
        )
        .unwrap();
        assert!(report.changed);
        // 0.8*2.5 + 0.4*2.5 + 0.5*2.0 + 0.2*1.5 + 0.6*1.5
        assert!((report.signals_bonus - 5.2).abs() < 1e-12);
        assert_eq!(
            store
                .signal_state_row(&startup())
                .unwrap()
                .last_significant_change_at,
            MonotonicTimeNs(100)
        );
    }

    #[test]
    fn at_signal_track_02_noise_level_wobble_is_a_noop() {
        let mut store = store_with_active();
        update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.8, 0.4, 0.5, 0.2, 0.6).unwrap(),
            MonotonicTimeNs(100),
        )
        .unwrap();

        // Largest relative shift is under 50% on every dimension.
        let report = update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.9, 0.45, 0.55, 0.25, 0.65).unwrap(),
            MonotonicTimeNs(200),
        )
        .unwrap();
        assert!(!report.changed);
        let state = store.signal_state_row(&startup()).unwrap();
        assert_eq!(state.dimensions.founder_momentum, 0.8);
        assert_eq!(state.last_significant_change_at, MonotonicTimeNs(100));
    }

    #[test]
    fn at_signal_track_03_half_relative_shift_updates_state() {
        let mut store = store_with_active();
        update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.4, 0.4, 0.5, 0.2, 0.6).unwrap(),
            MonotonicTimeNs(100),
        )
        .unwrap();

        // founder_momentum 0.4 -> 0.6 is exactly a 50% relative move.
        let report = update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.6, 0.4, 0.5, 0.2, 0.6).unwrap(),
            MonotonicTimeNs(200),
        )
        .unwrap();
        assert!(report.changed);
        let state = store.signal_state_row(&startup()).unwrap();
        assert_eq!(state.dimensions.founder_momentum, 0.6);
        assert_eq!(state.last_significant_change_at, MonotonicTimeNs(200));
    }

    #[test]
    fn at_signal_track_04_zero_to_positive_counts_as_significant() {
        let mut store = store_with_active();
        update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.0, 0.4, 0.5, 0.2, 0.6).unwrap(),
            MonotonicTimeNs(100),
        )
        .unwrap();

        let report = update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.1, 0.4, 0.5, 0.2, 0.6).unwrap(),
            MonotonicTimeNs(200),
        )
        .unwrap();
        assert!(report.changed);
    }

    #[test]
    fn at_signal_track_05_missing_runtime_config_fails_closed() {
        let mut store = PythiaStore::new_in_memory();
        let err = update_if_significant(
            &mut store,
            startup(),
            SignalDimensions::v1(0.5, 0.5, 0.5, 0.5, 0.5).unwrap(),
            MonotonicTimeNs(100),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::ForeignKeyViolation { .. }));
    }
}

#![forbid(unsafe_code)]

use pythia_kernel_contracts::mlgate::{
    CrossTimeStabilityGate, DimensionStability, FundamentalDimension, GateResult, GateThresholds,
    PositiveRateGate, SampleSizeGate, TrainingSample, TrainingSnapshot, MLGATE_CONTRACT_VERSION,
};
use pythia_kernel_contracts::{ContractViolation, Validate};

/// Span of one stability bucket. Fixed calendar-month-sized time spans over the
/// snapshot window; the minimum samples per bucket and minimum bucket count are
/// tunables on `GateThresholds`.
pub const STABILITY_BUCKET_SPAN_NS: u64 = 30 * 24 * 60 * 60 * 1_000_000_000;

/// The four checks of the gate, all required to pass. Pure over the snapshot,
/// no caching across calls: this is a pre-condition gate for a safety-critical
/// downstream decision and is recomputed fresh on every invocation.
pub fn evaluate(
    snapshot: &TrainingSnapshot,
    thresholds: &GateThresholds,
) -> Result<GateResult, ContractViolation> {
    snapshot.validate()?;
    thresholds.validate()?;

    let success_count = snapshot.samples.iter().filter(|s| s.is_successful).count() as u32;
    let fail_count = snapshot.samples.len() as u32 - success_count;

    let sample_size = SampleSizeGate {
        passed: success_count >= thresholds.min_success_count
            && fail_count >= thresholds.min_fail_count,
        success_count,
        fail_count,
        min_success_count: thresholds.min_success_count,
        min_fail_count: thresholds.min_fail_count,
    };

    let total = success_count + fail_count;
    let positive_rate = if total == 0 {
        0.0
    } else {
        f64::from(success_count) / f64::from(total)
    };
    let positive_rate = PositiveRateGate {
        passed: total > 0
            && positive_rate >= thresholds.positive_rate_min
            && positive_rate <= thresholds.positive_rate_max,
        positive_rate,
        rate_min: thresholds.positive_rate_min,
        rate_max: thresholds.positive_rate_max,
    };

    let stability = evaluate_stability(&snapshot.samples, thresholds);

    let passed = sample_size.passed && positive_rate.passed && stability.passed;
    let result = GateResult {
        schema_version: MLGATE_CONTRACT_VERSION,
        passed,
        sample_size,
        positive_rate,
        stability,
    };
    result.validate()?;
    Ok(result)
}

fn evaluate_stability(
    samples: &[TrainingSample],
    thresholds: &GateThresholds,
) -> CrossTimeStabilityGate {
    let buckets = partition_into_buckets(samples, thresholds);
    let qualifying_buckets = buckets.len() as u32;

    let mut dimensions = Vec::with_capacity(FundamentalDimension::ALL.len());
    let mut all_stable = qualifying_buckets >= thresholds.min_buckets;
    for &dimension in &FundamentalDimension::ALL {
        let mut positive = 0u32;
        let mut negative = 0u32;
        for bucket in &buckets {
            let delta = bucket_delta(bucket, dimension);
            if delta > 0.0 {
                positive += 1;
            } else if delta < 0.0 {
                negative += 1;
            }
            // A zero delta counts against agreement on both sides.
        }
        let agreement_ratio = if qualifying_buckets == 0 {
            0.0
        } else {
            f64::from(positive.max(negative)) / f64::from(qualifying_buckets)
        };
        let stable = qualifying_buckets >= thresholds.min_buckets
            && agreement_ratio >= thresholds.sign_agreement_ratio;
        all_stable = all_stable && stable;
        dimensions.push(DimensionStability {
            dimension,
            agreement_ratio,
            stable,
        });
    }

    CrossTimeStabilityGate {
        passed: all_stable,
        qualifying_buckets,
        min_buckets: thresholds.min_buckets,
        required_agreement_ratio: thresholds.sign_agreement_ratio,
        dimensions,
    }
}

/// Partition samples into fixed time spans from the earliest score date. A
/// bucket qualifies only when it holds at least `min_bucket_samples` samples
/// and both outcome classes, since the delta is undefined otherwise.
fn partition_into_buckets<'a>(
    samples: &'a [TrainingSample],
    thresholds: &GateThresholds,
) -> Vec<Vec<&'a TrainingSample>> {
    let Some(earliest) = samples.iter().map(|s| s.score_date.0).min() else {
        return Vec::new();
    };
    let latest = samples
        .iter()
        .map(|s| s.score_date.0)
        .max()
        .unwrap_or(earliest);
    let span_count = ((latest - earliest) / STABILITY_BUCKET_SPAN_NS + 1) as usize;

    let mut buckets: Vec<Vec<&TrainingSample>> = vec![Vec::new(); span_count];
    for sample in samples {
        let index = ((sample.score_date.0 - earliest) / STABILITY_BUCKET_SPAN_NS) as usize;
        buckets[index].push(sample);
    }
    buckets.retain(|bucket| {
        bucket.len() >= thresholds.min_bucket_samples as usize
            && bucket.iter().any(|s| s.is_successful)
            && bucket.iter().any(|s| !s.is_successful)
    });
    buckets
}

fn bucket_delta(bucket: &[&TrainingSample], dimension: FundamentalDimension) -> f64 {
    let mut success_sum = 0.0;
    let mut success_n = 0u32;
    let mut fail_sum = 0.0;
    let mut fail_n = 0u32;
    for sample in bucket {
        let score = dimension.score_of(&sample.fundamentals);
        if sample.is_successful {
            success_sum += score;
            success_n += 1;
        } else {
            fail_sum += score;
            fail_n += 1;
        }
    }
    // Qualifying buckets always contain both classes.
    success_sum / f64::from(success_n) - fail_sum / f64::from(fail_n)
}

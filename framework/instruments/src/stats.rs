use crate::{FailureKind, Sample};
use gale_summary_model::GroupStats;

/// Compute summary statistics over a set of samples.
///
/// Latencies are sorted and summed as whole microseconds, so the result does not depend on the
/// order the samples were recorded in.
pub fn summarise<'a, I>(samples: I) -> GroupStats
where
    I: IntoIterator<Item = &'a Sample>,
{
    summarise_with_latencies(samples).0
}

/// Like [summarise], also returning the sorted latencies in microseconds that the statistics were
/// computed from.
pub fn summarise_with_latencies<'a, I>(samples: I) -> (GroupStats, Vec<u64>)
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut failures = 0;
    let mut timeouts = 0;
    let mut latencies_us = samples
        .into_iter()
        .map(|sample| {
            match sample.failure {
                Some(FailureKind::Timeout) => {
                    failures += 1;
                    timeouts += 1;
                }
                Some(_) => failures += 1,
                None => {}
            }
            sample.latency.as_micros() as u64
        })
        .collect::<Vec<_>>();

    if latencies_us.is_empty() {
        return (GroupStats::default(), latencies_us);
    }

    latencies_us.sort_unstable();

    let count = latencies_us.len();
    let total_us = latencies_us.iter().map(|l| *l as u128).sum::<u128>();

    let stats = GroupStats {
        count,
        failures,
        timeouts,
        failure_rate: failures as f64 / count as f64,
        avg_ms: (total_us as f64 / count as f64) / 1000.0,
        min_ms: latencies_us[0] as f64 / 1000.0,
        med_ms: percentile(&latencies_us, 50.0) / 1000.0,
        p90_ms: percentile(&latencies_us, 90.0) / 1000.0,
        p95_ms: percentile(&latencies_us, 95.0) / 1000.0,
        max_ms: latencies_us[count - 1] as f64 / 1000.0,
    };

    (stats, latencies_us)
}

/// The `p`th percentile of already sorted values, interpolating linearly between the two closest
/// ranks. Returns 0 for an empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let lower_value = sorted[lower] as f64;
    let upper_value = sorted[upper] as f64;

    lower_value + (upper_value - lower_value) * (rank - lower as f64)
}

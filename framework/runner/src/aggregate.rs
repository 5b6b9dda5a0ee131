use crate::threshold::{MetricView, Series, ThresholdAssertion};
use gale_instruments::{summarise_with_latencies, Sample};
use gale_summary_model::RunResult;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Summarise the samples of a finished run and evaluate every threshold against them.
///
/// The result only depends on the samples, not on the order they were recorded in.
pub fn aggregate(
    samples_by_group: &[(Arc<str>, Vec<Sample>)],
    thresholds: &[ThresholdAssertion],
) -> RunResult {
    let view = MetricView {
        groups: samples_by_group
            .iter()
            .map(|(name, samples)| (name.to_string(), series(samples)))
            .collect(),
        overall: series(samples_by_group.iter().flat_map(|(_, samples)| samples)),
    };

    let outcomes = thresholds
        .iter()
        .map(|assertion| assertion.evaluate(&view))
        .collect::<Vec<_>>();

    for outcome in outcomes.iter().filter(|o| !o.passed) {
        log::warn!(
            "Threshold [{}] on [{}] failed, observed {:?}",
            outcome.expression,
            outcome.metric,
            outcome.observed
        );
    }

    let groups = view
        .groups
        .into_iter()
        .map(|(name, series)| (name, series.stats))
        .collect::<BTreeMap<_, _>>();

    RunResult::new(groups, view.overall.stats, outcomes)
}

fn series<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Series {
    let (stats, sorted_latencies_us) = summarise_with_latencies(samples);
    Series {
        stats,
        sorted_latencies_us,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_instruments::FailureKind;
    use std::time::{Duration, SystemTime};

    fn sample(group: &str, latency_ms: u64, status: u16) -> Sample {
        Sample {
            group: group.into(),
            vu_id: 0,
            iteration: 0,
            latency: Duration::from_millis(latency_ms),
            status: Some(status),
            failure: (status != 200).then_some(FailureKind::UnexpectedStatus),
            timestamp: SystemTime::UNIX_EPOCH,
        }
    }

    fn thresholds() -> Vec<ThresholdAssertion> {
        let groups = ["login", "contact"];
        vec![
            ThresholdAssertion::parse("http_req_duration{name:login}", "p(95)<500", &groups).unwrap(),
            ThresholdAssertion::parse("http_req_duration{name:contact}", "p(95)<500", &groups)
                .unwrap(),
            ThresholdAssertion::parse("http_req_failed", "rate<0.01", &groups).unwrap(),
        ]
    }

    fn samples() -> Vec<(Arc<str>, Vec<Sample>)> {
        vec![
            (
                "login".into(),
                (0..100).map(|i| sample("login", 40 + i % 20, 200)).collect(),
            ),
            (
                "contact".into(),
                (0..100)
                    .map(|i| sample("contact", 30 + i % 7, if i == 50 { 500 } else { 200 }))
                    .collect(),
            ),
        ]
    }

    #[test]
    fn same_samples_give_same_result() {
        let first = aggregate(&samples(), &thresholds());
        let second = aggregate(&samples(), &thresholds());
        pretty_assertions::assert_eq!(first, second);

        let mut reordered = samples();
        for (_, group_samples) in reordered.iter_mut() {
            group_samples.reverse();
        }
        pretty_assertions::assert_eq!(first, aggregate(&reordered, &thresholds()));
    }

    #[test]
    fn one_failure_in_two_hundred_breaks_the_rate_threshold() {
        let result = aggregate(&samples(), &thresholds());

        assert_eq!(200, result.overall.count);
        assert_eq!(1, result.overall.failures);
        assert_eq!(0.005, result.overall.failure_rate);
        // 0.5% is within the 1% budget.
        assert!(result.overall_pass);

        let mut samples = samples();
        samples[1].1.push(sample("contact", 30, 503));
        samples[1].1.push(sample("contact", 30, 503));
        let result = aggregate(&samples, &thresholds());

        assert!(!result.overall_pass);
        let failed = result.failed_thresholds().collect::<Vec<_>>();
        assert_eq!(1, failed.len());
        assert_eq!("http_req_failed", failed[0].metric);
    }

    #[test]
    fn groups_are_summarised_independently() {
        let result = aggregate(&samples(), &thresholds());

        assert_eq!(0, result.groups["login"].failures);
        assert_eq!(1, result.groups["contact"].failures);
        assert_eq!(40.0, result.groups["login"].min_ms);
        assert_eq!(59.0, result.groups["login"].max_ms);
        assert_eq!(36.0, result.groups["contact"].max_ms);
    }

    #[test]
    fn timeouts_are_counted_per_group_and_overall() {
        let mut samples = samples();
        let mut abandoned = sample("login", 5000, 200);
        abandoned.status = None;
        abandoned.failure = Some(FailureKind::Timeout);
        samples[0].1.push(abandoned);

        let result = aggregate(&samples, &thresholds());

        assert_eq!(1, result.groups["login"].timeouts);
        assert_eq!(1, result.groups["login"].failures);
        assert_eq!(0, result.groups["contact"].timeouts);
        assert_eq!(1, result.overall.timeouts);
        assert_eq!(2, result.overall.failures);
        assert_eq!(5000.0, result.overall.max_ms);
    }
}

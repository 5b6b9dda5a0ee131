use crate::error::ConfigError;
use gale_instruments::percentile;
use gale_summary_model::{GroupStats, ThresholdOutcome};
use std::collections::BTreeMap;

const DURATION_METRIC: &str = "http_req_duration";
const FAILED_METRIC: &str = "http_req_failed";

/// The metric a threshold is evaluated against, optionally narrowed to one request group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricKey {
    /// `http_req_duration` or `http_req_duration{name:<group>}`
    Duration { group: Option<String> },
    /// `http_req_failed` or `http_req_failed{name:<group>}`
    Failed { group: Option<String> },
}

impl MetricKey {
    pub fn parse(key: &str, group_names: &[&str]) -> Result<Self, ConfigError> {
        let key = key.trim();
        let (name, group) = match key.split_once('{') {
            Some((name, tags)) => {
                let tags = tags
                    .strip_suffix('}')
                    .ok_or_else(|| ConfigError::UnknownMetric(key.to_string()))?;
                let group = tags
                    .strip_prefix("name:")
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .ok_or_else(|| ConfigError::UnknownMetric(key.to_string()))?;
                if !group_names.contains(&group) {
                    return Err(ConfigError::UnknownGroup {
                        metric: key.to_string(),
                        group: group.to_string(),
                    });
                }
                (name, Some(group.to_string()))
            }
            None => (key, None),
        };

        match name {
            DURATION_METRIC => Ok(MetricKey::Duration { group }),
            FAILED_METRIC => Ok(MetricKey::Failed { group }),
            _ => Err(ConfigError::UnknownMetric(key.to_string())),
        }
    }

    fn group(&self) -> Option<&str> {
        match self {
            MetricKey::Duration { group } | MetricKey::Failed { group } => group.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Avg,
    Min,
    Med,
    Max,
    /// `p(N)`, with N between 0 and 100
    Percentile(f64),
    /// Fraction of failed requests
    Rate,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }
}

/// A parsed threshold such as `p(95)<500` on `http_req_duration{name:login}`.
///
/// Duration bounds are in milliseconds, rate bounds are fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdAssertion {
    pub metric: MetricKey,
    pub aggregate: Aggregate,
    pub comparison: Comparison,
    pub bound: f64,
    metric_text: String,
    expression_text: String,
}

impl ThresholdAssertion {
    pub fn parse(metric: &str, expression: &str, group_names: &[&str]) -> Result<Self, ConfigError> {
        let key = MetricKey::parse(metric, group_names)?;
        let invalid = |reason: &str| ConfigError::InvalidThreshold {
            metric: metric.to_string(),
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let compact = expression.split_whitespace().collect::<String>();
        let op_start = compact
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| invalid("missing comparison operator"))?;
        let (aggregate, rest) = compact.split_at(op_start);

        let (comparison, bound) = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
        ]
        .into_iter()
        .find_map(|(op, comparison)| rest.strip_prefix(op).map(|bound| (comparison, bound)))
        .ok_or_else(|| invalid("unknown comparison operator"))?;

        let bound = bound
            .parse::<f64>()
            .ok()
            .filter(|b| b.is_finite())
            .ok_or_else(|| invalid("bound is not a number"))?;

        let aggregate = match aggregate {
            "avg" => Aggregate::Avg,
            "min" => Aggregate::Min,
            "med" => Aggregate::Med,
            "max" => Aggregate::Max,
            "rate" => Aggregate::Rate,
            "count" => Aggregate::Count,
            p if p.starts_with("p(") && p.ends_with(')') => {
                let value = p
                    .get(2..p.len() - 1)
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|v| (0.0..=100.0).contains(v))
                    .ok_or_else(|| invalid("percentile must be between 0 and 100"))?;
                Aggregate::Percentile(value)
            }
            _ => return Err(invalid("unknown aggregation")),
        };

        let compatible = match (&key, aggregate) {
            (MetricKey::Duration { .. }, Aggregate::Rate) => false,
            (MetricKey::Duration { .. }, _) => true,
            (MetricKey::Failed { .. }, Aggregate::Rate | Aggregate::Count) => true,
            (MetricKey::Failed { .. }, _) => false,
        };
        if !compatible {
            return Err(invalid("aggregation does not apply to this metric"));
        }

        Ok(Self {
            metric: key,
            aggregate,
            comparison,
            bound,
            metric_text: metric.trim().to_string(),
            expression_text: expression.trim().to_string(),
        })
    }

    /// Check the assertion against the aggregated metrics. A metric with no samples fails.
    pub fn evaluate(&self, view: &MetricView) -> ThresholdOutcome {
        let observed = view
            .series(self.metric.group())
            .filter(|series| series.stats.count > 0)
            .map(|series| self.observe(series));

        ThresholdOutcome {
            metric: self.metric_text.clone(),
            expression: self.expression_text.clone(),
            observed,
            passed: observed.is_some_and(|o| self.comparison.holds(o, self.bound)),
        }
    }

    fn observe(&self, series: &Series) -> f64 {
        let stats = &series.stats;
        match self.aggregate {
            Aggregate::Avg => stats.avg_ms,
            Aggregate::Min => stats.min_ms,
            Aggregate::Med => stats.med_ms,
            Aggregate::Max => stats.max_ms,
            Aggregate::Percentile(p) => percentile(&series.sorted_latencies_us, p) / 1000.0,
            Aggregate::Rate => stats.failure_rate,
            Aggregate::Count => match self.metric {
                MetricKey::Duration { .. } => stats.count as f64,
                MetricKey::Failed { .. } => stats.failures as f64,
            },
        }
    }
}

/// Statistics and sorted latencies for one request group, or for all of them.
#[derive(Debug, Clone, Default)]
pub struct Series {
    pub stats: GroupStats,
    pub sorted_latencies_us: Vec<u64>,
}

/// Everything thresholds are evaluated against once a run has finished.
#[derive(Debug, Clone, Default)]
pub struct MetricView {
    pub groups: BTreeMap<String, Series>,
    pub overall: Series,
}

impl MetricView {
    fn series(&self, group: Option<&str>) -> Option<&Series> {
        match group {
            Some(group) => self.groups.get(group),
            None => Some(&self.overall),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPS: &[&str] = &["login", "contact"];

    fn series(latencies_ms: &[u64], failures: usize) -> Series {
        let sorted_latencies_us = {
            let mut l = latencies_ms.iter().map(|ms| ms * 1000).collect::<Vec<_>>();
            l.sort_unstable();
            l
        };
        let count = latencies_ms.len();
        Series {
            stats: GroupStats {
                count,
                failures,
                failure_rate: failures as f64 / count as f64,
                avg_ms: latencies_ms.iter().sum::<u64>() as f64 / count as f64,
                min_ms: *latencies_ms.iter().min().unwrap() as f64,
                max_ms: *latencies_ms.iter().max().unwrap() as f64,
                ..Default::default()
            },
            sorted_latencies_us,
        }
    }

    fn view() -> MetricView {
        let login = series(&[100, 200, 300, 400, 900], 0);
        let contact = series(&[10, 20, 30, 40, 50], 1);
        let overall = series(&[10, 20, 30, 40, 50, 100, 200, 300, 400, 900], 1);
        MetricView {
            groups: BTreeMap::from([
                ("login".to_string(), login),
                ("contact".to_string(), contact),
            ]),
            overall,
        }
    }

    #[test]
    fn parse_metric_keys() {
        assert_eq!(
            MetricKey::Duration {
                group: Some("login".to_string())
            },
            MetricKey::parse("http_req_duration{name:login}", GROUPS).unwrap()
        );
        assert_eq!(
            MetricKey::Failed { group: None },
            MetricKey::parse("http_req_failed", GROUPS).unwrap()
        );
        assert_eq!(
            Err(ConfigError::UnknownMetric("http_reqs".to_string())),
            MetricKey::parse("http_reqs", GROUPS)
        );
        assert_eq!(
            Err(ConfigError::UnknownMetric(
                "http_req_duration{status:200}".to_string()
            )),
            MetricKey::parse("http_req_duration{status:200}", GROUPS)
        );
        assert_eq!(
            Err(ConfigError::UnknownGroup {
                metric: "http_req_duration{name:checkout}".to_string(),
                group: "checkout".to_string()
            }),
            MetricKey::parse("http_req_duration{name:checkout}", GROUPS)
        );
    }

    #[test]
    fn parse_expressions() {
        let assertion =
            ThresholdAssertion::parse("http_req_duration{name:login}", "p(95) < 500", GROUPS)
                .unwrap();
        assert_eq!(Aggregate::Percentile(95.0), assertion.aggregate);
        assert_eq!(Comparison::Lt, assertion.comparison);
        assert_eq!(500.0, assertion.bound);

        let assertion = ThresholdAssertion::parse("http_req_failed", "rate<=0.01", GROUPS).unwrap();
        assert_eq!(Aggregate::Rate, assertion.aggregate);
        assert_eq!(Comparison::Le, assertion.comparison);

        for bad in ["p(95)", "p(101)<5", "p95<5", "avg<fast", "avg=<5", "rate<0.1"] {
            assert!(
                matches!(
                    ThresholdAssertion::parse("http_req_duration", bad, GROUPS),
                    Err(ConfigError::InvalidThreshold { .. })
                ),
                "{bad} should be rejected"
            );
        }

        assert!(matches!(
            ThresholdAssertion::parse("http_req_failed", "p(95)<500", GROUPS),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn evaluate_against_groups() {
        let view = view();

        let p95_login =
            ThresholdAssertion::parse("http_req_duration{name:login}", "p(95)<500", GROUPS)
                .unwrap()
                .evaluate(&view);
        assert!(!p95_login.passed);
        assert!((p95_login.observed.unwrap() - 800.0).abs() < 1e-6);

        let p95_contact =
            ThresholdAssertion::parse("http_req_duration{name:contact}", "p(95)<500", GROUPS)
                .unwrap()
                .evaluate(&view);
        assert!(p95_contact.passed);

        let failed = ThresholdAssertion::parse("http_req_failed", "rate<0.01", GROUPS)
            .unwrap()
            .evaluate(&view);
        assert!(!failed.passed);
        assert_eq!(Some(0.1), failed.observed);
        assert_eq!("http_req_failed", failed.metric);
        assert_eq!("rate<0.01", failed.expression);

        let count = ThresholdAssertion::parse("http_req_failed{name:login}", "count==0", GROUPS)
            .unwrap()
            .evaluate(&view);
        assert!(count.passed);
    }

    #[test]
    fn no_samples_fails() {
        let view = MetricView {
            groups: BTreeMap::from([("login".to_string(), Series::default())]),
            overall: Series::default(),
        };

        let outcome = ThresholdAssertion::parse("http_req_duration{name:login}", "p(95)<500", GROUPS)
            .unwrap()
            .evaluate(&view);

        assert!(!outcome.passed);
        assert_eq!(None, outcome.observed);
    }
}

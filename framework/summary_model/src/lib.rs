use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

/// Summary statistics for the samples of one request group, or for all groups together.
///
/// Latencies are in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupStats {
    /// The number of samples recorded
    pub count: usize,
    /// The number of samples that failed their check, errored or timed out
    pub failures: usize,
    /// The number of samples abandoned because the graceful stop ran out, included in `failures`
    #[serde(default)]
    pub timeouts: usize,
    /// `failures / count`, or 0 when there are no samples
    pub failure_rate: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub med_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

/// The outcome of evaluating one threshold expression against the aggregated metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdOutcome {
    /// The metric key as configured, e.g. `http_req_duration{name:login}`
    pub metric: String,
    /// The expression as configured, e.g. `p(95)<500`
    pub expression: String,
    /// The aggregate value the expression was checked against.
    ///
    /// Not set when the metric had no samples to aggregate.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// The result of a run, computed once all virtual users have finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    /// Statistics for each request group, keyed by group name
    pub groups: BTreeMap<String, GroupStats>,
    /// Statistics over the samples of every group
    pub overall: GroupStats,
    /// One outcome per configured threshold expression, in configuration order
    pub thresholds: Vec<ThresholdOutcome>,
    /// True when every threshold passed
    pub overall_pass: bool,
}

impl RunResult {
    pub fn new(
        groups: BTreeMap<String, GroupStats>,
        overall: GroupStats,
        thresholds: Vec<ThresholdOutcome>,
    ) -> Self {
        let overall_pass = thresholds.iter().all(|t| t.passed);
        Self {
            groups,
            overall,
            thresholds,
            overall_pass,
        }
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario profile that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The planned duration of the load, in seconds, not including the graceful stop window
    pub run_duration: u64,
    /// The highest number of virtual users that were live at the same time
    pub peak_vus: usize,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of.
    pub env: HashMap<String, String>,
    /// The version of Gale that was used for this run
    pub gale_version: String,
    /// The outcome of the run
    pub result: RunResult,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        run_duration: u64,
        gale_version: String,
        result: RunResult,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            run_duration,
            peak_vus: 0,
            env: HashMap::with_capacity(0),
            gale_version,
            result,
        }
    }

    /// Set the peak number of virtual users
    pub fn set_peak_vus(&mut self, peak_vus: usize) {
        self.peak_vus = peak_vus;
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to identify the configuration used to run the scenario, so
    /// that results from runs with the same configuration can be compared. It uses the
    ///     - Scenario name
    ///     - Run duration
    ///     - Selected environment variables
    ///     - Gale version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        Digest::update(&mut hasher, self.run_duration.to_le_bytes());
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.gale_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all("\n".as_bytes())?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary(run_id: &str) -> RunSummary {
        let mut groups = BTreeMap::new();
        groups.insert(
            "login".to_string(),
            GroupStats {
                count: 10,
                failures: 1,
                timeouts: 1,
                failure_rate: 0.1,
                avg_ms: 12.5,
                min_ms: 3.0,
                med_ms: 11.0,
                p90_ms: 20.0,
                p95_ms: 22.0,
                max_ms: 25.0,
            },
        );
        let result = RunResult::new(
            groups,
            GroupStats::default(),
            vec![ThresholdOutcome {
                metric: "http_req_failed".to_string(),
                expression: "rate<0.01".to_string(),
                observed: Some(0.1),
                passed: false,
            }],
        );

        RunSummary::new(
            run_id.to_string(),
            "baseline".to_string(),
            1_700_000_000,
            120,
            "0.1.0".to_string(),
            result,
        )
    }

    #[test]
    fn overall_pass_requires_every_threshold() {
        let summary = sample_summary("a");
        assert!(!summary.result.overall_pass);
        assert_eq!(1, summary.result.failed_thresholds().count());

        let empty = RunResult::new(BTreeMap::new(), GroupStats::default(), vec![]);
        assert!(empty.overall_pass);
    }

    #[test]
    fn fingerprint_ignores_run_id_and_env_order() {
        let mut first = sample_summary("a");
        first.add_env("BASE_URL".to_string(), "http://localhost:8000".to_string());
        first.add_env("PROFILE".to_string(), "baseline".to_string());

        let mut second = sample_summary("b");
        second.add_env("PROFILE".to_string(), "baseline".to_string());
        second.add_env("BASE_URL".to_string(), "http://localhost:8000".to_string());

        assert_eq!(first.fingerprint(), second.fingerprint());

        second.run_duration = 60;
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn append_and_load_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary.jsonl");

        append_run_summary(&sample_summary("a"), path.clone()).unwrap();
        append_run_summary(&sample_summary("b"), path.clone()).unwrap();

        let loaded = load_summary_runs(path).unwrap();
        assert_eq!(2, loaded.len());
        pretty_assertions::assert_eq!(sample_summary("a"), loaded[0]);
        assert_eq!("b", loaded[1].run_id);
    }

    #[test]
    fn stats_without_a_timeout_count_load_as_zero() {
        let stats: GroupStats = serde_json::from_str(
            r#"{"count":2,"failures":1,"failure_rate":0.5,"avg_ms":1.0,"min_ms":1.0,"med_ms":1.0,"p90_ms":1.0,"p95_ms":1.0,"max_ms":1.0}"#,
        )
        .unwrap();

        assert_eq!(1, stats.failures);
        assert_eq!(0, stats.timeouts);
    }
}

mod summary_table;

use crate::report::summary_table::{GroupRow, ThresholdRow};
use gale_summary_model::{append_run_summary, GroupStats, RunSummary};
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::Table;

/// Receives the summary of a finished run.
pub trait ReportCollector: Send + Sync {
    fn finalize(&self, summary: &RunSummary) -> anyhow::Result<()>;
}

/// Choose which collectors receive the run summary.
#[derive(Debug, Default, Clone)]
pub struct ReportConfig {
    summary: bool,
    jsonl_path: Option<PathBuf>,
}

impl ReportConfig {
    /// Print the summary tables to stdout when the run finishes.
    pub fn enable_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    /// Append the run summary as a JSON line to the given file.
    pub fn enable_jsonl(mut self, path: PathBuf) -> Self {
        self.jsonl_path = Some(path);
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector>> = Vec::new();
        if self.summary {
            collectors.push(Box::new(SummaryReportCollector));
        }
        if let Some(path) = self.jsonl_path {
            collectors.push(Box::new(JsonlReportCollector { path }));
        }

        Reporter { collectors }
    }
}

pub struct Reporter {
    collectors: Vec<Box<dyn ReportCollector>>,
}

impl Reporter {
    /// Hand the summary to every collector. A failing collector does not stop the others.
    pub fn finalize(&self, summary: &RunSummary) {
        for collector in &self.collectors {
            if let Err(e) = collector.finalize(summary) {
                log::error!("Failed to report run summary: {e:?}");
            }
        }
    }
}

/// Prints tables of the group statistics and threshold outcomes.
struct SummaryReportCollector;

impl SummaryReportCollector {
    fn print_summary_of_groups(&self, summary: &RunSummary) {
        println!("\nSummary of request groups");
        let mut rows = summary
            .result
            .groups
            .iter()
            .map(|(name, stats)| group_row(name, stats))
            .collect::<Vec<_>>();
        rows.push(group_row("(all)", &summary.result.overall));

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }

    fn print_thresholds(&self, summary: &RunSummary) {
        if summary.result.thresholds.is_empty() {
            return;
        }

        println!("\nThresholds");
        let rows = summary
            .result
            .thresholds
            .iter()
            .map(|outcome| ThresholdRow {
                metric: outcome.metric.clone(),
                threshold: outcome.expression.clone(),
                observed: outcome
                    .observed
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_else(|| "no samples".to_string()),
                result: if outcome.passed { "pass" } else { "FAIL" },
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }
}

impl ReportCollector for SummaryReportCollector {
    fn finalize(&self, summary: &RunSummary) -> anyhow::Result<()> {
        self.print_summary_of_groups(summary);
        self.print_thresholds(summary);
        println!(
            "\nRun {} ({}) with peak {} virtual users: {}",
            summary.run_id,
            summary.scenario_name,
            summary.peak_vus,
            if summary.result.overall_pass {
                "PASSED"
            } else {
                "FAILED"
            }
        );
        Ok(())
    }
}

struct JsonlReportCollector {
    path: PathBuf,
}

impl ReportCollector for JsonlReportCollector {
    fn finalize(&self, summary: &RunSummary) -> anyhow::Result<()> {
        append_run_summary(summary, self.path.clone())?;
        log::info!("Appended run summary to {}", self.path.display());
        Ok(())
    }
}

fn group_row(name: &str, stats: &GroupStats) -> GroupRow {
    GroupRow {
        group: name.to_string(),
        avg_ms: stats.avg_ms,
        min_ms: stats.min_ms,
        med_ms: stats.med_ms,
        p90_ms: stats.p90_ms,
        p95_ms: stats.p95_ms,
        max_ms: stats.max_ms,
        requests: stats.count,
        failed: stats.failure_rate,
        timeouts: stats.timeouts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_summary_model::{load_summary_runs, RunResult};
    use std::collections::BTreeMap;

    fn summary() -> RunSummary {
        let mut groups = BTreeMap::new();
        groups.insert("login".to_string(), GroupStats::default());
        RunSummary::new(
            "run".to_string(),
            "baseline".to_string(),
            0,
            120,
            "test".to_string(),
            RunResult::new(groups, GroupStats::default(), vec![]),
        )
    }

    #[test]
    fn jsonl_collector_appends_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let reporter = ReportConfig::default()
            .enable_summary()
            .enable_jsonl(path.clone())
            .init();
        reporter.finalize(&summary());
        reporter.finalize(&summary());

        let runs = load_summary_runs(path).unwrap();
        assert_eq!(2, runs.len());
        pretty_assertions::assert_eq!(summary(), runs[0]);
    }

    #[test]
    fn group_table_shows_timeouts() {
        let stats = GroupStats {
            count: 4,
            failures: 2,
            timeouts: 1,
            failure_rate: 0.5,
            ..Default::default()
        };

        let row = group_row("login", &stats);
        assert_eq!(1, row.timeouts);

        let table = Table::new([row]).to_string();
        assert!(table.contains("timeouts"));
        assert!(table.contains("50.00%"));
    }
}

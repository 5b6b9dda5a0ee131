use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use gale_core::prelude::ShutdownHandle;
use gale_instruments::{MetricStore, ReportConfig};
use gale_summary_model::RunSummary;

use crate::aggregate::aggregate;
use crate::config::RunPhase;
use crate::context::{RunnerContext, VuContext};
use crate::definition::ScenarioDefinitionBuilder;
use crate::executor::Executor;
use crate::iteration::run_virtual_user;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;

/// Run a scenario to completion and report on it.
///
/// The scenario is validated before anything starts, so an invalid configuration returns a
/// [crate::error::ConfigError] without sending a single request. Failing thresholds are not an
/// error, check [gale_summary_model::RunResult::overall_pass] on the returned summary.
pub fn run(definition: ScenarioDefinitionBuilder) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;
    let config = &definition.config;
    let run_config = &definition.run_config;

    log::info!("Running scenario: {}", definition.name);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let stop_handle = ShutdownHandle::new();
    let abandon_handle = ShutdownHandle::new();
    let finished_handle = ShutdownHandle::new();

    let executor = Arc::new(Executor::new(runtime, abandon_handle.clone()));
    start_shutdown_listener(&executor, stop_handle.clone());

    let store = Arc::new(MetricStore::new(definition.group_names()));
    let runner_context = Arc::new(RunnerContext::new(
        executor,
        definition.transport.clone(),
        store.clone(),
        definition.setup.clone(),
        definition.plan.clone(),
        config.pacing_policy(),
        stop_handle.clone(),
    ));

    let total_duration = config.total_duration();
    if !run_config.no_progress {
        start_progress(total_duration, finished_handle.new_listener());
    }
    if run_config.monitor {
        start_monitor(finished_handle.new_listener());
    }

    let started_at = chrono::Utc::now().timestamp();
    let start = Instant::now();

    let mut scheduler = Scheduler::new(runner_context.clone());
    let mut phase = RunPhase::Idle;
    let mut spawn_error = None;

    loop {
        let elapsed = start.elapsed();
        if elapsed >= total_duration || stop_handle.is_shutdown() {
            break;
        }

        phase = log_phase_change(phase, config.phase_at(elapsed), elapsed);

        if let Err(e) = scheduler.reconcile(config.target_vus_at(elapsed)) {
            log::error!("Stopping the run early: {e:?}");
            spawn_error = Some(e);
            break;
        }

        let wait = run_config.tick.min(total_duration.saturating_sub(start.elapsed()));
        runner_context
            .executor()
            .pause(wait, stop_handle.new_listener(), finished_handle.new_listener());
    }

    stop_handle.shutdown();
    phase = log_phase_change(phase, RunPhase::Draining, start.elapsed());
    scheduler.drain(config.graceful_stop, &abandon_handle);

    finished_handle.shutdown();
    log_phase_change(phase, RunPhase::Finished, start.elapsed());

    if let Some(e) = spawn_error {
        return Err(e);
    }

    // Every virtual user has been joined, so once the scheduler and the shared context are gone
    // the store has no other owner and its samples can be moved out.
    let peak_vus = scheduler.peak_vus;
    drop(scheduler);
    drop(runner_context);
    let samples_by_group = match Arc::try_unwrap(store) {
        Ok(store) => store.into_samples(),
        Err(store) => {
            log::warn!("Metric store is still shared, copying samples");
            store
                .group_names()
                .map(|group| (Arc::from(group), store.snapshot(group)))
                .collect()
        }
    };
    let sample_count = samples_by_group.iter().map(|(_, s)| s.len()).sum::<usize>();
    let result = aggregate(&samples_by_group, &definition.thresholds);

    let mut summary = RunSummary::new(
        run_config.run_id.clone().unwrap_or_else(|| nanoid::nanoid!()),
        definition.name.clone(),
        started_at,
        start.elapsed().as_secs(),
        env!("CARGO_PKG_VERSION").to_string(),
        result,
    );
    summary.set_peak_vus(peak_vus);
    for (key, value) in &run_config.env {
        summary.add_env(key.clone(), value.clone());
    }

    let mut report_config = ReportConfig::default();
    if run_config.print_summary {
        report_config = report_config.enable_summary();
    }
    if let Some(path) = &run_config.summary_path {
        report_config = report_config.enable_jsonl(path.clone());
    }
    report_config.init().finalize(&summary);

    log::info!(
        "Scenario {} finished with {} samples, {}",
        summary.scenario_name,
        sample_count,
        if summary.result.overall_pass { "passed" } else { "failed" }
    );

    Ok(summary)
}

fn log_phase_change(current: RunPhase, next: RunPhase, elapsed: Duration) -> RunPhase {
    if current != next {
        log::info!("Run phase {current:?} -> {next:?} after {elapsed:?}");
    }
    next
}

struct VirtualUserHandle {
    vu_id: usize,
    retire_handle: ShutdownHandle,
    thread: JoinHandle<()>,
}

/// Keeps the number of running virtual users in line with the target.
struct Scheduler {
    runner_context: Arc<RunnerContext>,
    /// Oldest first, so the newest virtual users are the first to be retired.
    active: Vec<VirtualUserHandle>,
    /// Finishing their current iteration before they exit.
    retiring: Vec<VirtualUserHandle>,
    next_vu_id: usize,
    peak_vus: usize,
}

impl Scheduler {
    fn new(runner_context: Arc<RunnerContext>) -> Self {
        Self {
            runner_context,
            active: Vec::new(),
            retiring: Vec::new(),
            next_vu_id: 0,
            peak_vus: 0,
        }
    }

    fn reconcile(&mut self, target: usize) -> anyhow::Result<()> {
        self.reap();

        while self.active.len() < target {
            let vu = self.spawn()?;
            self.active.push(vu);
        }

        while self.active.len() > target {
            if let Some(vu) = self.active.pop() {
                log::debug!("Retiring vu {}", vu.vu_id);
                vu.retire_handle.shutdown();
                self.retiring.push(vu);
            }
        }

        self.runner_context.set_active_vus(self.active.len());
        self.peak_vus = self.peak_vus.max(self.active.len());

        Ok(())
    }

    fn spawn(&mut self) -> anyhow::Result<VirtualUserHandle> {
        self.next_vu_id += 1;
        let vu_id = self.next_vu_id;

        let retire_handle = ShutdownHandle::new();
        let ctx = VuContext::new(vu_id, self.runner_context.clone(), retire_handle.new_listener());

        let thread = std::thread::Builder::new()
            .name(format!("vu-{vu_id}"))
            .spawn(move || run_virtual_user(ctx))
            .with_context(|| format!("Failed to spawn thread for vu {vu_id}"))?;

        Ok(VirtualUserHandle {
            vu_id,
            retire_handle,
            thread,
        })
    }

    fn reap(&mut self) {
        reap_finished(&mut self.active);
        reap_finished(&mut self.retiring);
    }

    fn running(&self) -> usize {
        self.active.len() + self.retiring.len()
    }

    /// Wait for every virtual user to exit. Anything still in flight when `graceful_stop` runs
    /// out is abandoned.
    fn drain(&mut self, graceful_stop: Duration, abandon_handle: &ShutdownHandle) {
        let deadline = Instant::now() + graceful_stop;

        loop {
            self.reap();
            self.runner_context.set_active_vus(self.active.len());
            if self.running() == 0 {
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "{} virtual users still running after the graceful stop of {graceful_stop:?}, abandoning in-flight requests",
                    self.running()
                );
                abandon_handle.shutdown();
                break;
            }

            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }

        for vu in self.active.drain(..).chain(self.retiring.drain(..)) {
            join_vu(vu);
        }
        self.runner_context.set_active_vus(0);
    }
}

fn reap_finished(handles: &mut Vec<VirtualUserHandle>) {
    let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(handles)
        .into_iter()
        .partition(|vu| vu.thread.is_finished());
    *handles = running;

    for vu in finished {
        join_vu(vu);
    }
}

fn join_vu(vu: VirtualUserHandle) {
    if vu.thread.join().is_err() {
        log::error!("Thread for vu {} panicked", vu.vu_id);
    }
}

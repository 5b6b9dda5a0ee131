use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gale_core::prelude::Transport;

use crate::cli::GaleScenarioCli;
use crate::config::ScenarioConfig;
use crate::error::ConfigError;
use crate::group::{IterationPlan, RequestGroup};
use crate::threshold::ThresholdAssertion;

/// How the runner itself behaves, as opposed to the load it applies.
///
/// Built from the command line at the entry point and passed in explicitly, the runner does not
/// read the environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// How often the scheduler reconciles the number of virtual users with the target.
    pub tick: Duration,
    pub no_progress: bool,
    /// Watch the CPU usage of the runner process and warn when it is high.
    pub monitor: bool,
    /// Print summary tables when the run finishes.
    pub print_summary: bool,
    /// Append the run summary as a JSON line to this file.
    pub summary_path: Option<PathBuf>,
    pub run_id: Option<String>,
    /// Recorded with the run summary and used in its fingerprint.
    pub env: Vec<(String, String)>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            no_progress: true,
            monitor: false,
            print_summary: false,
            summary_path: None,
            run_id: None,
            env: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn from_cli(cli: &GaleScenarioCli) -> Self {
        Self {
            tick: Duration::from_millis(cli.tick_ms.max(1)),
            no_progress: cli.no_progress,
            monitor: true,
            print_summary: true,
            summary_path: cli.summary_path.clone(),
            run_id: cli.run_id.clone(),
            env: Vec::new(),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder {
    /// The name of the scenario, usually the name of the load profile.
    name: String,
    /// Sends the requests of every virtual user.
    transport: Arc<dyn Transport>,
    /// The shape of the load and its thresholds. Defaults to a single virtual user for a second.
    config: ScenarioConfig,
    /// The requests each virtual user sends once, in order, before its first iteration.
    setup: Vec<RequestGroup>,
    /// The requests each virtual user sends, in order, on every iteration.
    groups: Vec<RequestGroup>,
    /// The requests a virtual user picks one of, by weight, on every iteration.
    weighted: Vec<(RequestGroup, u32)>,
    run_config: RunConfig,
}

pub(crate) struct ScenarioDefinition {
    pub name: String,
    pub transport: Arc<dyn Transport>,
    pub config: ScenarioConfig,
    pub thresholds: Vec<ThresholdAssertion>,
    pub setup: Vec<RequestGroup>,
    pub plan: IterationPlan,
    pub run_config: RunConfig,
}

impl ScenarioDefinition {
    /// Every group name that samples can be recorded under, setup groups first.
    pub fn group_names(&self) -> Vec<Arc<str>> {
        group_names(&self.setup, self.plan.groups())
    }
}

impl ScenarioDefinitionBuilder {
    pub fn new(name: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.to_string(),
            transport,
            config: ScenarioConfig::constant(1, Duration::from_secs(1)),
            setup: Vec::new(),
            groups: Vec::new(),
            weighted: Vec::new(),
            run_config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScenarioConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Add a request group. Groups are sent in the order they are added.
    pub fn use_group(mut self, group: RequestGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Add a request group that each virtual user sends once when it starts, before its first
    /// iteration. Its samples are recorded with iteration 0.
    ///
    /// A setup group may share its name with an iteration group, their samples are then
    /// aggregated together.
    pub fn use_setup_group(mut self, group: RequestGroup) -> Self {
        self.setup.push(group);
        self
    }

    /// Add a request group to pick from at random. Each iteration sends exactly one of the
    /// weighted groups, chosen in proportion to `weight`.
    ///
    /// Cannot be combined with [ScenarioDefinitionBuilder::use_group].
    pub fn use_weighted_group(mut self, group: RequestGroup, weight: u32) -> Self {
        self.weighted.push((group, weight));
        self
    }

    pub(crate) fn build(self) -> Result<ScenarioDefinition, ConfigError> {
        let plan = match (self.groups.is_empty(), self.weighted.is_empty()) {
            (true, true) => return Err(ConfigError::NoGroups),
            (false, false) => return Err(ConfigError::MixedGroups),
            (false, true) => {
                check_unique(self.groups.iter())?;
                IterationPlan::Sequence(self.groups)
            }
            (true, false) => {
                check_unique(self.weighted.iter().map(|(group, _)| group))?;
                IterationPlan::weighted(self.weighted)?
            }
        };
        check_unique(self.setup.iter())?;

        let owned_names = group_names(&self.setup, plan.groups());
        let names = owned_names.iter().map(|name| &**name).collect::<Vec<_>>();
        let thresholds = self.config.validate(&names)?;

        Ok(ScenarioDefinition {
            name: self.name,
            transport: self.transport,
            config: self.config,
            thresholds,
            setup: self.setup,
            plan,
            run_config: self.run_config,
        })
    }
}

fn check_unique<'a>(groups: impl Iterator<Item = &'a RequestGroup>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for group in groups {
        if !seen.insert(&*group.name) {
            return Err(ConfigError::DuplicateGroup(group.name.to_string()));
        }
    }
    Ok(())
}

fn group_names(setup: &[RequestGroup], groups: &[RequestGroup]) -> Vec<Arc<str>> {
    let mut seen = HashSet::new();
    setup
        .iter()
        .chain(groups)
        .filter(|group| seen.insert(group.name.clone()))
        .map(|group| group.name.clone())
        .collect()
}

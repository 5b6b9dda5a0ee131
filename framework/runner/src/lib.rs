mod aggregate;
mod cli;
mod config;
mod context;
mod definition;
mod error;
mod executor;
mod group;
mod init;
mod iteration;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod threshold;
mod types;

pub mod prelude {
    pub use crate::aggregate::aggregate;
    pub use crate::cli::GaleScenarioCli;
    pub use crate::config::{
        LoadMode, Pacing, RunPhase, ScenarioConfig, Stage, DEFAULT_GRACEFUL_STOP, DEFAULT_PACING,
    };
    pub use crate::context::{RunnerContext, VuContext};
    pub use crate::definition::{RunConfig, ScenarioDefinitionBuilder};
    pub use crate::error::ConfigError;
    pub use crate::executor::Executor;
    pub use crate::group::{IterationPlan, PayloadTemplate, RequestGroup};
    pub use crate::init::init;
    pub use crate::iteration::run_iteration;
    pub use crate::run::run;
    pub use crate::threshold::{
        Aggregate, Comparison, MetricKey, MetricView, Series, ThresholdAssertion,
    };
    pub use crate::types::GaleResult;

    pub use gale_core::prelude::*;
    pub use gale_instruments::{FailureKind, Sample};
    pub use gale_summary_model::{GroupStats, RunResult, RunSummary, ThresholdOutcome};
}

use std::time::Duration;

/// A scenario that cannot be run. Raised before any virtual user is started.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("A staged scenario needs at least one stage")]
    NoStages,
    #[error("`{field}` has a negative duration [{value}]")]
    NegativeDuration { field: String, value: String },
    #[error("Stage {index} has a negative target of {target} virtual users")]
    NegativeTarget { index: usize, target: i64 },
    #[error("Negative number of virtual users: {0}")]
    NegativeVus(i64),
    #[error("Cannot scale durations by {0}, the factor must be a finite number of at least 0")]
    InvalidScale(f64),
    #[error("The maximum pacing of {max:?} is shorter than the pacing of {min:?}")]
    InvalidPacingRange { min: Duration, max: Duration },
    #[error("Specify either `vus` and `duration` or `stages`, not both")]
    AmbiguousMode,
    #[error("Specify either `vus` and `duration` or `stages`")]
    MissingMode,
    #[error("At least one request group must be defined")]
    NoGroups,
    #[error("Request group [{0}] is defined more than once")]
    DuplicateGroup(String),
    #[error("Request group [{0}] has a weight of 0")]
    ZeroWeight(String),
    #[error("Use either weighted or sequential request groups, not both")]
    MixedGroups,
    #[error("Unknown metric [{0}]")]
    UnknownMetric(String),
    #[error("Threshold on [{metric}] refers to unknown request group [{group}]")]
    UnknownGroup { metric: String, group: String },
    #[error("Invalid threshold [{expression}] on [{metric}]: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },
    #[error("Unknown profile [{0}]")]
    UnknownProfile(String),
    #[error("Invalid scenario file: {0}")]
    Parse(String),
}

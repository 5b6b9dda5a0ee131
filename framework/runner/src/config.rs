use crate::error::ConfigError;
use crate::threshold::ThresholdAssertion;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default time allowed for in-flight iterations to finish once the load has ended.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);
/// Default sleep between iterations of a virtual user.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// One ramp or hold segment of a staged load profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    /// The number of virtual users to reach by the end of the stage.
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadMode {
    /// A fixed number of virtual users for a fixed time.
    Constant { vus: usize, duration: Duration },
    /// Ramp the number of virtual users through each stage in turn.
    Staged { stages: Vec<Stage> },
}

/// Where a run is at a point in time, according to its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Ramping,
    Holding,
    Draining,
    Finished,
}

/// The shape of the load and the thresholds it has to meet.
///
/// Immutable once a run has started.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub mode: LoadMode,
    /// Threshold expressions keyed by metric, in the order they were added.
    pub thresholds: Vec<(String, Vec<String>)>,
    pub graceful_stop: Duration,
    /// Sleep between iterations, or the shortest sleep when `max_pacing` is set.
    pub pacing: Duration,
    /// Pick each sleep at random between `pacing` and this.
    pub max_pacing: Option<Duration>,
}

impl ScenarioConfig {
    pub fn constant(vus: usize, duration: Duration) -> Self {
        Self::new(LoadMode::Constant { vus, duration })
    }

    pub fn staged(stages: Vec<Stage>) -> Self {
        Self::new(LoadMode::Staged { stages })
    }

    fn new(mode: LoadMode) -> Self {
        Self {
            mode,
            thresholds: Vec::new(),
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            pacing: DEFAULT_PACING,
            max_pacing: None,
        }
    }

    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self.max_pacing = None;
        self
    }

    /// Sleep for a random time between `min` and `max` after each iteration.
    pub fn with_pacing_range(mut self, min: Duration, max: Duration) -> Self {
        self.pacing = min;
        self.max_pacing = Some(max);
        self
    }

    pub fn pacing_policy(&self) -> Pacing {
        match self.max_pacing {
            Some(max) if max > self.pacing => Pacing::Between(self.pacing, max),
            _ => Pacing::Fixed(self.pacing),
        }
    }

    /// Add threshold expressions for a metric, e.g. `("http_req_duration{name:login}", ["p(95)<500"])`.
    ///
    /// Expressions are only parsed when the scenario is validated.
    pub fn with_threshold(mut self, metric: &str, expressions: &[&str]) -> Self {
        let expressions = expressions.iter().map(|e| e.to_string());
        match self.thresholds.iter_mut().find(|(m, _)| m == metric) {
            Some((_, existing)) => existing.extend(expressions),
            None => self
                .thresholds
                .push((metric.to_string(), expressions.collect())),
        }
        self
    }

    /// Multiply every duration in the configuration by `factor`.
    ///
    /// Useful for a quick run of a long profile, the shape of the load is kept. The factor must
    /// be finite and not negative, and no scaled duration may overflow.
    pub fn scaled(mut self, factor: f64) -> Result<Self, ConfigError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(ConfigError::InvalidScale(factor));
        }
        let scale = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() * factor)
                .map_err(|_| ConfigError::InvalidScale(factor))
        };

        self.mode = match self.mode {
            LoadMode::Constant { vus, duration } => LoadMode::Constant {
                vus,
                duration: scale(duration)?,
            },
            LoadMode::Staged { stages } => LoadMode::Staged {
                stages: stages
                    .into_iter()
                    .map(|s| Ok(Stage::new(scale(s.duration)?, s.target)))
                    .collect::<Result<_, ConfigError>>()?,
            },
        };
        self.graceful_stop = scale(self.graceful_stop)?;
        self.pacing = scale(self.pacing)?;
        self.max_pacing = self.max_pacing.map(scale).transpose()?;

        Ok(self)
    }

    /// Check the load shape and parse the thresholds against the request groups of the run.
    pub fn validate(&self, group_names: &[&str]) -> Result<Vec<ThresholdAssertion>, ConfigError> {
        if let LoadMode::Staged { stages } = &self.mode {
            if stages.is_empty() {
                return Err(ConfigError::NoStages);
            }
        }
        if let Some(max) = self.max_pacing {
            if max < self.pacing {
                return Err(ConfigError::InvalidPacingRange {
                    min: self.pacing,
                    max,
                });
            }
        }

        let mut assertions = Vec::new();
        for (metric, expressions) in &self.thresholds {
            for expression in expressions {
                assertions.push(ThresholdAssertion::parse(metric, expression, group_names)?);
            }
        }

        Ok(assertions)
    }

    /// Time until the load ends, not counting the graceful stop window.
    pub fn total_duration(&self) -> Duration {
        match &self.mode {
            LoadMode::Constant { duration, .. } => *duration,
            LoadMode::Staged { stages } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    /// The number of virtual users that should be running `elapsed` after the start of the run.
    ///
    /// Constant loads drop to 0 as soon as their duration is over. Staged loads ramp linearly
    /// from the previous stage's target, starting from 0, to each stage's target, then hold the
    /// final target until the graceful stop window has also passed.
    pub fn target_vus_at(&self, elapsed: Duration) -> usize {
        match &self.mode {
            LoadMode::Constant { vus, duration } => {
                if elapsed < *duration {
                    *vus
                } else {
                    0
                }
            }
            LoadMode::Staged { stages } => {
                let mut stage_start = Duration::ZERO;
                let mut from = 0;
                for stage in stages {
                    let stage_end = stage_start + stage.duration;
                    if elapsed < stage_end {
                        let progress = (elapsed - stage_start).as_secs_f64()
                            / stage.duration.as_secs_f64();
                        return ramp(from, stage.target, progress);
                    }

                    from = stage.target;
                    stage_start = stage_end;
                }

                if elapsed >= stage_start + self.graceful_stop {
                    0
                } else {
                    from
                }
            }
        }
    }

    pub fn phase_at(&self, elapsed: Duration) -> RunPhase {
        let total = self.total_duration();
        if elapsed >= total + self.graceful_stop {
            return RunPhase::Finished;
        }
        if elapsed >= total {
            return RunPhase::Draining;
        }

        match &self.mode {
            LoadMode::Constant { .. } => RunPhase::Holding,
            LoadMode::Staged { stages } => {
                let mut stage_start = Duration::ZERO;
                let mut from = 0;
                for stage in stages {
                    let stage_end = stage_start + stage.duration;
                    if elapsed < stage_end {
                        return if stage.target == from {
                            RunPhase::Holding
                        } else {
                            RunPhase::Ramping
                        };
                    }
                    from = stage.target;
                    stage_start = stage_end;
                }
                RunPhase::Holding
            }
        }
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse a scenario from TOML. Durations use the `humantime` format, such as `30s` or `12h`.
    ///
    /// ```toml
    /// graceful_stop = "30s"
    /// pacing = "200ms"
    /// max_pacing = "1s"
    ///
    /// [[stages]]
    /// duration = "10s"
    /// target = 100
    ///
    /// [thresholds]
    /// "http_req_duration{name:login}" = ["p(95)<500"]
    /// http_req_failed = ["rate<0.01"]
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table = content
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        reject_negative_durations(&table)?;

        let raw: RawScenarioConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        let mode = match (raw.vus, raw.duration, raw.stages) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => return Err(ConfigError::AmbiguousMode),
            (Some(vus), Some(duration), None) => {
                if vus < 0 {
                    return Err(ConfigError::NegativeVus(vus));
                }
                LoadMode::Constant {
                    vus: vus as usize,
                    duration,
                }
            }
            (None, None, Some(raw_stages)) => {
                let mut stages = Vec::with_capacity(raw_stages.len());
                for (index, stage) in raw_stages.into_iter().enumerate() {
                    if stage.target < 0 {
                        return Err(ConfigError::NegativeTarget {
                            index,
                            target: stage.target,
                        });
                    }
                    stages.push(Stage::new(stage.duration, stage.target as usize));
                }
                LoadMode::Staged { stages }
            }
            _ => return Err(ConfigError::MissingMode),
        };

        let mut config = Self::new(mode);
        if let Some(graceful_stop) = raw.graceful_stop {
            config.graceful_stop = graceful_stop;
        }
        if let Some(pacing) = raw.pacing {
            config.pacing = pacing;
        }
        config.max_pacing = raw.max_pacing;
        config.thresholds = raw.thresholds.into_iter().collect();

        Ok(config)
    }
}

/// How long a virtual user sleeps between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    Fixed(Duration),
    /// Uniformly at random, both ends included.
    Between(Duration, Duration),
}

impl Pacing {
    pub fn next<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Pacing::Fixed(duration) => duration,
            Pacing::Between(min, max) => rng.gen_range(min..=max),
        }
    }
}

fn ramp(from: usize, to: usize, progress: f64) -> usize {
    let value = from as f64 + (to as f64 - from as f64) * progress.clamp(0.0, 1.0);
    value.round() as usize
}

const DURATION_FIELDS: &[&str] = &["duration", "graceful_stop", "pacing", "max_pacing"];

/// `humantime` has no negative durations, so catch them before deserializing to say which field
/// was wrong.
fn reject_negative_durations(table: &toml::Table) -> Result<(), ConfigError> {
    let negative = |field: String, value: Option<&toml::Value>| match value.and_then(|v| v.as_str()) {
        Some(value) if value.trim_start().starts_with('-') => Err(ConfigError::NegativeDuration {
            field,
            value: value.trim().to_string(),
        }),
        _ => Ok(()),
    };

    for field in DURATION_FIELDS {
        negative(field.to_string(), table.get(*field))?;
    }

    if let Some(stages) = table.get("stages").and_then(|s| s.as_array()) {
        for (index, stage) in stages.iter().enumerate() {
            negative(format!("stages[{index}].duration"), stage.get("duration"))?;
        }
    }

    Ok(())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenarioConfig {
    vus: Option<i64>,
    #[serde(default, with = "humantime_serde")]
    duration: Option<Duration>,
    stages: Option<Vec<RawStage>>,
    #[serde(default)]
    thresholds: BTreeMap<String, Vec<String>>,
    #[serde(default, with = "humantime_serde")]
    graceful_stop: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pacing: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    max_pacing: Option<Duration>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStage {
    #[serde(with = "humantime_serde")]
    duration: Duration,
    target: i64,
}

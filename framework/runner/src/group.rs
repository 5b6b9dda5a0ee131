use crate::error::ConfigError;
use gale_core::prelude::{HttpMethod, HttpRequest};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;

/// A named request that virtual users send during a run.
///
/// Samples are aggregated per group name.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestGroup {
    pub name: Arc<str>,
    pub method: HttpMethod,
    pub path: String,
    pub payload: PayloadTemplate,
    pub expected_status: u16,
}

impl RequestGroup {
    /// A `POST` of a JSON payload which is expected to return `200`.
    pub fn post(name: &str, path: &str, payload: Value) -> Self {
        Self {
            name: name.into(),
            method: HttpMethod::Post,
            path: path.to_string(),
            payload: PayloadTemplate::new(payload),
            expected_status: 200,
        }
    }

    pub fn with_expected_status(mut self, expected_status: u16) -> Self {
        self.expected_status = expected_status;
        self
    }

    pub(crate) fn build_request(&self, vu_id: usize, iteration: u64) -> HttpRequest {
        HttpRequest {
            method: self.method,
            path: self.path.clone(),
            body: Some(self.payload.render(vu_id, iteration)),
        }
    }
}

/// What a virtual user sends on each iteration.
#[derive(Debug, Clone)]
pub enum IterationPlan {
    /// Every group, in order.
    Sequence(Vec<RequestGroup>),
    /// A single group, picked at random in proportion to its weight.
    Weighted {
        groups: Vec<RequestGroup>,
        weights: WeightedIndex<u32>,
    },
}

impl IterationPlan {
    pub fn weighted(weighted_groups: Vec<(RequestGroup, u32)>) -> Result<Self, ConfigError> {
        if let Some((group, _)) = weighted_groups.iter().find(|(_, weight)| *weight == 0) {
            return Err(ConfigError::ZeroWeight(group.name.to_string()));
        }

        let weights = WeightedIndex::new(weighted_groups.iter().map(|(_, weight)| *weight))
            .map_err(|_| ConfigError::NoGroups)?;
        let groups = weighted_groups.into_iter().map(|(group, _)| group).collect();

        Ok(Self::Weighted { groups, weights })
    }

    /// Every group the plan can send.
    pub fn groups(&self) -> &[RequestGroup] {
        match self {
            Self::Sequence(groups) => groups,
            Self::Weighted { groups, .. } => groups,
        }
    }

    /// The groups to send for the next iteration.
    pub fn next_groups<R: Rng + ?Sized>(&self, rng: &mut R) -> &[RequestGroup] {
        match self {
            Self::Sequence(groups) => groups,
            Self::Weighted { groups, weights } => {
                let picked = weights.sample(rng);
                std::slice::from_ref(&groups[picked])
            }
        }
    }
}

/// A JSON body in which string values may contain `{{vu}}` and `{{iteration}}`.
///
/// The placeholders are replaced for every request, so that virtual users can send distinct
/// payloads. A template without placeholders is sent as is.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadTemplate {
    template: Value,
    has_placeholders: bool,
}

impl PayloadTemplate {
    pub fn new(template: Value) -> Self {
        let has_placeholders = contains_placeholder(&template);
        Self {
            template,
            has_placeholders,
        }
    }

    pub fn render(&self, vu_id: usize, iteration: u64) -> Value {
        if !self.has_placeholders {
            return self.template.clone();
        }

        substitute(&self.template, &vu_id.to_string(), &iteration.to_string())
    }
}

fn contains_placeholder(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("{{vu}}") || s.contains("{{iteration}}"),
        Value::Array(items) => items.iter().any(contains_placeholder),
        Value::Object(fields) => fields.values().any(contains_placeholder),
        _ => false,
    }
}

fn substitute(value: &Value, vu: &str, iteration: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace("{{vu}}", vu).replace("{{iteration}}", iteration)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, vu, iteration)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), substitute(v, vu, iteration)))
                .collect(),
        ),
        other => other.clone(),
    }
}

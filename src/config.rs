//! Validated run configuration: the request-level knobs an optimization run is
//! started with, plus the per-dimension quality-axis configuration, realized as
//! `bon::Builder` structs so every tunable gets a sensible default while still
//! letting the host override individual fields.

use std::collections::BTreeMap;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One configured quality axis. `weight` must be `>= 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionConfig {
    pub description: String,
    pub weight: f64,
}

/// The name -> config mapping, plus the derived *active* subset.
///
/// Active dimensions are the intersection of `selected_metrics` and the configured
/// dimension map; if that intersection is empty, the single built-in `accuracy`
/// dimension (weight 1) is used instead, so a run is never left with zero scoring
/// axes.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSet {
    active: BTreeMap<String, DimensionConfig>,
}

const BUILTIN_ACCURACY: &str = "accuracy";

impl DimensionSet {
    /// Builds the active dimension set from the full configured map and the host's
    /// requested subset. Returns [`ConfigError::NegativeWeight`] if any *active*
    /// dimension carries a negative weight.
    pub fn new(
        configured: &BTreeMap<String, DimensionConfig>,
        selected_metrics: &[String],
    ) -> Result<Self, ConfigError> {
        let mut active: BTreeMap<String, DimensionConfig> = if selected_metrics.is_empty() {
            configured.clone()
        } else {
            selected_metrics
                .iter()
                .filter_map(|name| configured.get(name).map(|cfg| (name.clone(), cfg.clone())))
                .collect()
        };

        if active.is_empty() {
            active.insert(
                BUILTIN_ACCURACY.to_string(),
                DimensionConfig {
                    description: "Overall correctness and helpfulness of the response.".into(),
                    weight: 1.0,
                },
            );
        }

        for (name, cfg) in &active {
            if cfg.weight < 0.0 {
                return Err(ConfigError::NegativeWeight(name.clone()));
            }
        }

        Ok(Self { active })
    }

    /// Builds a `DimensionSet` of just the built-in `accuracy` dimension, used when
    /// no host configuration is supplied at all.
    pub fn builtin_accuracy() -> Self {
        let mut active = BTreeMap::new();
        active.insert(
            BUILTIN_ACCURACY.to_string(),
            DimensionConfig {
                description: "Overall correctness and helpfulness of the response.".into(),
                weight: 1.0,
            },
        );
        Self { active }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&DimensionConfig> {
        self.active.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DimensionConfig)> {
        self.active.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Which [`crate::pareto::ParetoFrontier`] selector the optimization loop uses to pick
/// each iteration's parent candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    #[default]
    CurrentBest,
    Pareto,
}

/// Text/structured trajectory-generation mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Text,
    Structured,
}

/// The full set of knobs an optimization run is started with.
#[derive(Debug, Clone, Builder)]
pub struct OptimizeConfig {
    pub optimization_model: String,
    pub reflection_model: String,

    #[builder(default = 3)]
    pub batch_size: usize,

    #[builder(default = 10)]
    pub num_rollouts: usize,

    #[builder(default)]
    pub selected_metrics: Vec<String>,

    #[builder(default = false)]
    pub use_structured_output: bool,

    pub structured_output_schema: Option<serde_json::Value>,

    #[builder(default = 4)]
    pub max_parallel: usize,

    #[builder(default = 5)]
    pub max_steps: usize,

    #[builder(default)]
    pub selector: SelectorKind,

    #[builder(default = 60)]
    pub call_timeout_seconds: u64,
}

impl OptimizeConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    pub fn generation_mode(&self) -> GenerationMode {
        if self.use_structured_output {
            GenerationMode::Structured
        } else {
            GenerationMode::Text
        }
    }

    /// Validates the knobs that cannot be checked structurally by the builder:
    /// `batch_size >= 1` and, when `use_structured_output` is set, that a schema was
    /// actually supplied. Called once at run start, before any iteration executes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::BatchSizeZero);
        }
        if self.use_structured_output && self.structured_output_schema.is_none() {
            return Err(ConfigError::StructuredOutputMissingSchema);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(pairs: &[(&str, f64)]) -> BTreeMap<String, DimensionConfig> {
        pairs
            .iter()
            .map(|(name, weight)| {
                (
                    name.to_string(),
                    DimensionConfig {
                        description: String::new(),
                        weight: *weight,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn empty_selection_falls_back_to_builtin_accuracy() {
        let configured = dims(&[("tone", 0.5)]);
        let active = DimensionSet::new(&configured, &[]).unwrap();
        assert_eq!(active.len(), 1);
        assert!(active.get("accuracy").is_some());
    }

    #[test]
    fn empty_configured_and_empty_selection_also_falls_back() {
        let configured = BTreeMap::new();
        let active = DimensionSet::new(&configured, &[]).unwrap();
        assert_eq!(active.len(), 1);
        assert!(active.get("accuracy").is_some());
    }

    #[test]
    fn selection_intersects_configured_dimensions() {
        let configured = dims(&[("tone", 0.5), ("accuracy", 1.0)]);
        let active = DimensionSet::new(&configured, &["tone".to_string()]).unwrap();
        assert_eq!(active.len(), 1);
        assert!(active.get("tone").is_some());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let configured = dims(&[("tone", -0.1)]);
        let err = DimensionSet::new(&configured, &["tone".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeWeight(name) if name == "tone"));
    }

    #[test]
    fn structured_output_without_schema_is_rejected() {
        let config = OptimizeConfig::builder()
            .optimization_model("gpt-task")
            .reflection_model("gpt-judge")
            .use_structured_output(true)
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StructuredOutputMissingSchema)
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = OptimizeConfig::builder()
            .optimization_model("gpt-task")
            .reflection_model("gpt-judge")
            .batch_size(0)
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::BatchSizeZero)));
    }
}

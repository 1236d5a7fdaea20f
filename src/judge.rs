//! Scores one `(sample, trajectory)` pair across the active quality dimensions via
//! LLM-as-judge, and produces the textual feedback the reflection rewriter consumes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::DimensionSet;
use crate::llm::{with_timeout, LlmClient, LlmError};
use crate::sample::{FeedbackRating, Sample};
use crate::trajectory::Trajectory;

/// Per-dimension scores in `[0, 1]`. Dimensions absent from a judge's response are
/// simply not keys here — missing is distinct from a zero score.
pub type MetricScores = BTreeMap<String, f64>;

/// One sample's judged result.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeResult {
    pub metrics: MetricScores,
    pub overall_score: f64,
    pub detailed_feedback: String,
    pub suggested_improvements: String,
}

impl JudgeResult {
    fn failed(reason: &str) -> Self {
        Self {
            metrics: MetricScores::new(),
            overall_score: 0.0,
            detailed_feedback: format!("[judge failed: {reason}]"),
            suggested_improvements: String::new(),
        }
    }

    /// Placeholder result for a sample whose judging was skipped because the run
    /// was cancelled after its trajectory was generated.
    pub(crate) fn cancelled() -> Self {
        Self::failed("cancelled")
    }
}

/// Weighted mean of present dimensions against `dimensions`' configured weights. An
/// empty `metrics` map yields `0.0`, matching an all-missing judge response.
pub fn weighted_overall(metrics: &MetricScores, dimensions: &DimensionSet) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (name, score) in metrics {
        if let Some(cfg) = dimensions.get(name) {
            weighted_sum += score * cfg.weight;
            weight_total += cfg.weight;
        }
    }
    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}

/// Builds the structured-output schema the judge call is constrained to: one numeric
/// field per active dimension in `[0, 1]` plus `detailedFeedback` and
/// `suggestedImprovements`.
pub fn judge_schema(dimensions: &DimensionSet) -> Value {
    let mut properties = serde_json::Map::new();
    for (name, _) in dimensions.iter() {
        properties.insert(
            name.to_string(),
            serde_json::json!({ "type": "number", "minimum": 0, "maximum": 1 }),
        );
    }
    properties.insert(
        "detailedFeedback".to_string(),
        serde_json::json!({ "type": "string" }),
    );
    properties.insert(
        "suggestedImprovements".to_string(),
        serde_json::json!({ "type": "string" }),
    );
    let required: Vec<&str> = dimensions
        .names()
        .chain(["detailedFeedback", "suggestedImprovements"])
        .collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Instructions used when rendering the judge prompt, configurable per host so the
/// wording can be tuned without touching the prompt template itself.
#[derive(Debug, Clone)]
pub struct PolarityInstructions {
    pub positive_feedback_instruction: String,
    pub negative_feedback_instruction: String,
    pub comparison_positive: String,
    pub comparison_negative: String,
}

impl Default for PolarityInstructions {
    fn default() -> Self {
        Self {
            positive_feedback_instruction:
                "Treat the sample's assistant turns as the reference for a good response."
                    .to_string(),
            negative_feedback_instruction:
                "Treat the sample's assistant turns as an anti-example of a bad response."
                    .to_string(),
            comparison_positive: "Does the generated trajectory match the quality of the reference?"
                .to_string(),
            comparison_negative:
                "Does the generated trajectory avoid the mistakes in the anti-example?"
                    .to_string(),
        }
    }
}

/// Scores one `(sample, trajectory)` pair via structured-output LLM judging.
pub struct MetricJudge<'a> {
    pub reflection_model: &'a dyn LlmClient,
    pub model_id: &'a str,
    pub dimensions: &'a DimensionSet,
    pub instructions: &'a PolarityInstructions,
    pub call_timeout: std::time::Duration,
}

impl<'a> MetricJudge<'a> {
    pub async fn judge(&self, sample: &Sample, trajectory: &Trajectory) -> JudgeResult {
        let schema = judge_schema(self.dimensions);
        let prompt = self.render_prompt(sample, trajectory);

        let result = with_timeout(
            self.call_timeout,
            self.reflection_model
                .object_generate(self.model_id, &prompt, &schema),
        )
        .await;

        match result {
            Ok(value) => self.parse_response(value),
            Err(err) => JudgeResult::failed(&judge_error_reason(&err)),
        }
    }

    fn render_prompt(&self, sample: &Sample, trajectory: &Trajectory) -> String {
        let dimension_list = self
            .dimensions
            .iter()
            .map(|(name, cfg)| format!("- {name} (weight {}): {}", cfg.weight, cfg.description))
            .collect::<Vec<_>>()
            .join("\n");

        let polarity = match sample.effective_rating() {
            FeedbackRating::Positive => (
                &self.instructions.positive_feedback_instruction,
                &self.instructions.comparison_positive,
            ),
            FeedbackRating::Negative => (
                &self.instructions.negative_feedback_instruction,
                &self.instructions.comparison_negative,
            ),
        };

        let sample_messages = sample
            .messages
            .iter()
            .map(|m| m.render_verbatim())
            .collect::<Vec<_>>()
            .join("\n\n");
        let trajectory_messages = trajectory
            .messages
            .iter()
            .map(|m| m.render_verbatim())
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Dimensions:\n{dimension_list}\n\n\
             Polarity instruction: {}\n\
             Comparison: {}\n\n\
             Sample conversation:\n{sample_messages}\n\n\
             Generated trajectory:\n{trajectory_messages}\n",
            polarity.0, polarity.1
        )
    }

    fn parse_response(&self, value: Value) -> JudgeResult {
        let Some(object) = value.as_object() else {
            return JudgeResult::failed("response was not a JSON object");
        };

        let mut metrics = MetricScores::new();
        for (name, _) in self.dimensions.iter() {
            if let Some(raw) = object.get(name).and_then(Value::as_f64) {
                metrics.insert(name.to_string(), raw.clamp(0.0, 1.0));
            }
        }

        let detailed_feedback = object
            .get("detailedFeedback")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let suggested_improvements = object
            .get("suggestedImprovements")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let overall_score = weighted_overall(&metrics, self.dimensions);

        JudgeResult {
            metrics,
            overall_score,
            detailed_feedback,
            suggested_improvements,
        }
    }
}

fn judge_error_reason(err: &LlmError) -> String {
    match err {
        LlmError::Provider(msg) => msg.clone(),
        LlmError::Timeout(duration) => format!("timed out after {duration:?}"),
        LlmError::SchemaViolation(msg) => msg.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedClient;
    use crate::sample::{ConversationMessage, Sample};
    use std::collections::BTreeMap as Map;

    fn accuracy_only() -> DimensionSet {
        let mut configured = Map::new();
        configured.insert(
            "accuracy".to_string(),
            crate::config::DimensionConfig {
                description: "correctness".into(),
                weight: 1.0,
            },
        );
        DimensionSet::new(&configured, &[]).unwrap()
    }

    fn trajectory_with(text: &str) -> Trajectory {
        crate::trajectory::Trajectory {
            id: "t1".into(),
            timestamp: chrono::Utc::now(),
            messages: vec![
                ConversationMessage::user("hi"),
                ConversationMessage::assistant_text(text),
            ],
        }
    }

    #[tokio::test]
    async fn successful_judge_clamps_out_of_range_scores() {
        let client = ScriptedClient::new(vec![]).with_objects(vec![Ok(serde_json::json!({
            "accuracy": 1.4,
            "detailedFeedback": "too verbose",
            "suggestedImprovements": "be concise",
        }))]);
        let dimensions = accuracy_only();
        let instructions = PolarityInstructions::default();
        let judge = MetricJudge {
            reflection_model: &client,
            model_id: "judge-model",
            dimensions: &dimensions,
            instructions: &instructions,
            call_timeout: std::time::Duration::from_secs(60),
        };
        let sample = Sample::new("s1", vec![ConversationMessage::user("hi")]);
        let result = judge.judge(&sample, &trajectory_with("hello")).await;
        assert_eq!(result.metrics.get("accuracy"), Some(&1.0));
        assert_eq!(result.overall_score, 1.0);
    }

    #[tokio::test]
    async fn provider_failure_yields_marker_feedback_and_zero_score() {
        let client = ScriptedClient::new(vec![])
            .with_objects(vec![Err(LlmError::Provider("rate limited".into()))]);
        let dimensions = accuracy_only();
        let instructions = PolarityInstructions::default();
        let judge = MetricJudge {
            reflection_model: &client,
            model_id: "judge-model",
            dimensions: &dimensions,
            instructions: &instructions,
            call_timeout: std::time::Duration::from_secs(60),
        };
        let sample = Sample::new("s1", vec![ConversationMessage::user("hi")]);
        let result = judge.judge(&sample, &trajectory_with("hello")).await;
        assert!(result.metrics.is_empty());
        assert_eq!(result.overall_score, 0.0);
        assert!(result.detailed_feedback.starts_with("[judge failed:"));
    }
}

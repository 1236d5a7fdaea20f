//! Evaluates a candidate prompt against a batch of samples, fanning the per-sample
//! generate-then-judge work out across a bounded worker pool and aggregating the
//! results into a single batch score.

use futures::stream::{self, StreamExt};

use crate::cancellation::Cancellation;
use crate::config::{DimensionSet, GenerationMode};
use crate::judge::{weighted_overall, JudgeResult, MetricJudge, MetricScores, PolarityInstructions};
use crate::llm::{LlmClient, ToolDefinition};
use crate::sample::Sample;
use crate::trajectory::TrajectoryGenerator;

/// The aggregated result of evaluating a prompt against a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEvaluation {
    pub metrics: MetricScores,
    pub overall_score: f64,
    /// One entry per sample, in batch order. Failed samples contribute `""`.
    pub feedbacks: Vec<String>,
    /// One entry per sample, in batch order. Failed samples contribute `""`.
    pub suggestions: Vec<String>,
    /// Each sample's judged result, in batch order, for event emission.
    pub per_sample: Vec<JudgeResult>,
}

/// Evaluates a candidate prompt against a drawn batch of samples.
pub struct BatchEvaluator<'a> {
    pub task_model: &'a dyn LlmClient,
    pub reflection_model: &'a dyn LlmClient,
    pub task_model_id: &'a str,
    pub reflection_model_id: &'a str,
    pub tools: &'a [ToolDefinition],
    pub dimensions: &'a DimensionSet,
    pub instructions: &'a PolarityInstructions,
    pub max_parallel: usize,
    pub max_steps: usize,
    pub call_timeout: std::time::Duration,
    pub cancellation: &'a dyn Cancellation,
}

impl<'a> BatchEvaluator<'a> {
    /// Generates then judges every sample in `batch`, bounded by `max_parallel`
    /// concurrent `(generate, judge)` pairs, and aggregates the results.
    ///
    /// Cancellation is checked once per sample, between generating its trajectory
    /// and judging it, so a cancelled run skips the remaining judge calls in the
    /// batch it was mid-way through rather than waiting for all of them to finish.
    ///
    /// `on_sample` is invoked once per completed sample, in *batch order* (the
    /// sample's position in the drawn batch, regardless of completion order), so the
    /// caller can emit progress events without re-deriving ordering itself.
    pub async fn evaluate(
        &self,
        batch: &[Sample],
        prompt: &str,
        mode: GenerationMode,
        schema: Option<&serde_json::Value>,
        mut on_sample: impl FnMut(usize, &Sample, &JudgeResult),
    ) -> BatchEvaluation {
        if batch.is_empty() {
            return BatchEvaluation {
                metrics: MetricScores::new(),
                overall_score: 0.0,
                feedbacks: Vec::new(),
                suggestions: Vec::new(),
                per_sample: Vec::new(),
            };
        }

        let generator = TrajectoryGenerator {
            task_model: self.task_model,
            model_id: self.task_model_id,
            tools: self.tools,
            max_steps: self.max_steps,
            call_timeout: self.call_timeout,
        };
        let judge = MetricJudge {
            reflection_model: self.reflection_model,
            model_id: self.reflection_model_id,
            dimensions: self.dimensions,
            instructions: self.instructions,
            call_timeout: self.call_timeout,
        };

        let tasks = batch.iter().enumerate().map(|(index, sample)| {
            let generator = &generator;
            let judge = &judge;
            let cancellation = self.cancellation;
            async move {
                let trajectory = generator.generate(sample, prompt, mode, schema).await;
                let result = if cancellation.is_cancelled() {
                    JudgeResult::cancelled()
                } else {
                    judge.judge(sample, &trajectory).await
                };
                (index, result)
            }
        });

        let mut results: Vec<Option<JudgeResult>> = (0..batch.len()).map(|_| None).collect();
        let mut completed = stream::iter(tasks).buffer_unordered(self.max_parallel.max(1));
        while let Some((index, result)) = completed.next().await {
            results[index] = Some(result);
        }

        let per_sample: Vec<JudgeResult> = results.into_iter().map(|r| r.expect("every index filled")).collect();

        for (index, (sample, result)) in batch.iter().zip(per_sample.iter()).enumerate() {
            on_sample(index, sample, result);
        }

        aggregate(per_sample, self.dimensions)
    }
}

fn aggregate(per_sample: Vec<JudgeResult>, dimensions: &DimensionSet) -> BatchEvaluation {
    let mut sums: MetricScores = MetricScores::new();
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    let mut overall_sum = 0.0;

    for result in &per_sample {
        for (name, score) in &result.metrics {
            *sums.entry(name.clone()).or_insert(0.0) += score;
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        overall_sum += weighted_overall(&result.metrics, dimensions);
    }

    let metrics: MetricScores = sums
        .into_iter()
        .map(|(name, sum)| {
            let count = counts[&name] as f64;
            (name, sum / count)
        })
        .collect();

    let overall_score = overall_sum / per_sample.len() as f64;

    let feedbacks = per_sample.iter().map(|r| r.detailed_feedback.clone()).collect();
    let suggestions = per_sample
        .iter()
        .map(|r| r.suggested_improvements.clone())
        .collect();

    BatchEvaluation {
        metrics,
        overall_score,
        feedbacks,
        suggestions,
        per_sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DimensionConfig;
    use crate::llm::test_support::ScriptedClient;
    use crate::sample::ConversationMessage;
    use std::collections::BTreeMap;

    fn accuracy_only() -> DimensionSet {
        let mut configured = BTreeMap::new();
        configured.insert(
            "accuracy".to_string(),
            DimensionConfig {
                description: "correctness".into(),
                weight: 1.0,
            },
        );
        DimensionSet::new(&configured, &[]).unwrap()
    }

    #[tokio::test]
    async fn aggregates_mean_overall_score_across_samples() {
        let task_client = ScriptedClient::new(vec![Ok("r1".into()), Ok("r2".into())]);
        let judge_client = ScriptedClient::new(vec![]).with_objects(vec![
            Ok(serde_json::json!({"accuracy": 0.4, "detailedFeedback": "a", "suggestedImprovements": "x"})),
            Ok(serde_json::json!({"accuracy": 0.8, "detailedFeedback": "b", "suggestedImprovements": "y"})),
        ]);
        let dimensions = accuracy_only();
        let instructions = PolarityInstructions::default();
        let evaluator = BatchEvaluator {
            task_model: &task_client,
            reflection_model: &judge_client,
            task_model_id: "task",
            reflection_model_id: "judge",
            tools: &[],
            dimensions: &dimensions,
            instructions: &instructions,
            max_parallel: 2,
            max_steps: 5,
            call_timeout: std::time::Duration::from_secs(60),
            cancellation: &crate::cancellation::NeverCancel,
        };
        let batch = vec![
            Sample::new("s1", vec![ConversationMessage::user("a")]),
            Sample::new("s2", vec![ConversationMessage::user("b")]),
        ];
        let mut seen_order = Vec::new();
        let evaluation = evaluator
            .evaluate(&batch, "seed prompt", GenerationMode::Text, None, |index, _, _| {
                seen_order.push(index);
            })
            .await;
        assert_eq!(seen_order, vec![0, 1]);
        assert_eq!(evaluation.feedbacks, vec!["a".to_string(), "b".to_string()]);
        assert!((evaluation.overall_score - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_batch_yields_zero_overall_and_empty_metrics() {
        let task_client = ScriptedClient::new(vec![]);
        let judge_client = ScriptedClient::new(vec![]);
        let dimensions = accuracy_only();
        let instructions = PolarityInstructions::default();
        let evaluator = BatchEvaluator {
            task_model: &task_client,
            reflection_model: &judge_client,
            task_model_id: "task",
            reflection_model_id: "judge",
            tools: &[],
            dimensions: &dimensions,
            instructions: &instructions,
            max_parallel: 2,
            max_steps: 5,
            call_timeout: std::time::Duration::from_secs(60),
            cancellation: &crate::cancellation::NeverCancel,
        };
        let evaluation = evaluator
            .evaluate(&[], "seed prompt", GenerationMode::Text, None, |_, _, _| {})
            .await;
        assert_eq!(evaluation.overall_score, 0.0);
        assert!(evaluation.metrics.is_empty());
    }
}

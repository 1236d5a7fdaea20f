//! The optimization loop: seed evaluation, per-iteration parent selection, minibatch
//! draw, mutate-then-evaluate, acceptance testing, and frontier update.

use rand::seq::IteratorRandom;

use crate::config::{DimensionSet, OptimizeConfig};
use crate::error::CoreError;
use crate::evaluator::BatchEvaluator;
use crate::events::{Event, EventSink};
use crate::judge::{JudgeResult, PolarityInstructions};
use crate::llm::{LlmClient, ToolDefinition};
use crate::pareto::{ParetoFrontier, PromptCandidate, SEED_CANDIDATE_ID};
use crate::reflection::ReflectionRewriter;
use crate::sample::{filter_valid_samples, Sample};
use tracing::{info, warn};

pub use crate::cancellation::{Cancellation, NeverCancel};

/// Everything one run needs: samples, models, config, and the sink to report
/// progress to. Constructed once per `run` call; no module-level mutable state.
pub struct OptimizationRun<'a> {
    pub samples: Vec<Sample>,
    pub seed_prompt: String,
    pub dimensions: DimensionSet,
    pub config: &'a OptimizeConfig,
    pub task_model: &'a dyn LlmClient,
    pub reflection_model: &'a dyn LlmClient,
    pub tools: &'a [ToolDefinition],
    pub instructions: PolarityInstructions,
    pub sink: &'a dyn EventSink,
    pub cancellation: &'a dyn Cancellation,
}

/// The frozen outcome of a completed run: final prompt, best score, and the full
/// candidate collection.
pub struct RunOutcome {
    pub final_prompt: String,
    pub best_overall: f64,
    pub candidates: Vec<PromptCandidate>,
}

impl<'a> OptimizationRun<'a> {
    pub async fn run(mut self) -> Result<RunOutcome, CoreError> {
        if let Err(config_err) = self.config.validate() {
            let core_err = CoreError::from(config_err);
            warn!(reason = %core_err, "optimization run aborted: invalid configuration");
            self.sink.emit(Event::Error {
                iteration: 0,
                message: core_err.to_string(),
                reason: core_err.event_reason(),
            });
            return Err(core_err);
        }

        let (valid_samples, skipped_ids) = filter_valid_samples(std::mem::take(&mut self.samples));
        for id in &skipped_ids {
            warn!(sample_id = %id, "skipping sample with no user message");
        }
        self.samples = valid_samples;

        if self.samples.is_empty() {
            warn!("optimization run aborted: no samples provided");
            self.sink.emit(Event::Error {
                iteration: 0,
                message: "no samples provided".to_string(),
                reason: CoreError::NoSamples.event_reason(),
            });
            return Err(CoreError::NoSamples);
        }

        info!(samples = self.samples.len(), num_rollouts = self.config.num_rollouts, "optimization run starting");
        self.sink.emit(Event::Start {
            iteration: 0,
            message: "optimization run starting".to_string(),
        });

        let mut frontier = ParetoFrontier::new(self.samples.len());

        let seed_batch = self.draw_batch();
        let seed_eval = self
            .evaluate_batch(0, &self.seed_prompt, &seed_batch)
            .await;

        let seed_candidate = PromptCandidate {
            id: SEED_CANDIDATE_ID.to_string(),
            prompt: self.seed_prompt.clone(),
            metrics: seed_eval.metrics.clone(),
            overall_score: seed_eval.overall_score,
            parents: Vec::new(),
            discovered_at_iteration: 0,
        };
        let per_sample_overall: Vec<f64> = seed_eval
            .per_sample
            .iter()
            .map(|r| r.overall_score)
            .collect();
        frontier.observe(SEED_CANDIDATE_ID, &per_sample_overall);
        frontier.update_frontier(seed_candidate.clone(), &self.dimensions);

        let mut best_overall = seed_eval.overall_score;
        let mut best_candidate_id = SEED_CANDIDATE_ID.to_string();

        info!(batch_score = seed_eval.overall_score, "seed prompt evaluated");
        self.sink.emit(Event::SeedEvaluated {
            iteration: 0,
            message: "seed prompt evaluated".to_string(),
            batch_score: seed_eval.overall_score,
        });

        for iteration in 1..=self.config.num_rollouts as u32 {
            if self.cancellation.is_cancelled() {
                info!(iteration, "cancellation observed before iteration start");
                break;
            }

            self.sink.emit(Event::IterationStart {
                iteration,
                message: format!("iteration {iteration} starting"),
            });

            let outcome = self
                .run_iteration(iteration, &frontier, &mut best_overall, &mut best_candidate_id)
                .await;

            match outcome {
                Ok(Some(candidate)) => {
                    let per_sample_overall: Vec<f64> =
                        candidate.metrics_per_sample_overall.clone();
                    frontier.observe(&candidate.candidate.id, &per_sample_overall);
                    frontier.update_frontier(candidate.candidate, &self.dimensions);
                }
                Ok(None) => {}
                Err(reason) => {
                    warn!(iteration, %reason, "iteration failed unexpectedly");
                    self.sink.emit(Event::IterationError {
                        iteration,
                        message: reason,
                    });
                }
            }
        }

        let candidates = frontier.candidates_in_order().into_iter().cloned().collect::<Vec<_>>();
        let final_prompt = frontier
            .get(&best_candidate_id)
            .map(|c| c.prompt.clone())
            .unwrap_or_else(|| self.seed_prompt.clone());

        info!(best_overall, collection_size = candidates.len(), "optimization run complete");
        self.sink.emit(Event::Complete {
            iteration: self.config.num_rollouts as u32,
            message: "optimization run complete".to_string(),
            final_prompt: final_prompt.clone(),
            best_score: best_overall,
            collection_size: candidates.len(),
            candidates: candidates.clone(),
        });

        Ok(RunOutcome {
            final_prompt,
            best_overall,
            candidates,
        })
    }

    /// Runs one iteration's parent-select / evaluate-parent / reflect / evaluate-child
    /// / accept-or-reject sequence. Returns `Ok(Some(..))` with the accepted candidate
    /// plus its per-sample overalls, `Ok(None)` on rejection or cooperative
    /// cancellation mid-sample, and `Err(reason)` on an unexpected failure that
    /// should surface as `iteration_error`.
    async fn run_iteration(
        &self,
        iteration: u32,
        frontier: &ParetoFrontier,
        best_overall: &mut f64,
        best_candidate_id: &mut String,
    ) -> Result<Option<AcceptedCandidate>, String> {
        let Some(parent) = frontier.select(self.config.selector) else {
            return Err("no parent candidate available to select".to_string());
        };
        let parent = parent.clone();

        let batch = self.draw_batch();

        let parent_eval = self
            .evaluate_batch(iteration, &parent.prompt, &batch)
            .await;

        if self.cancellation.is_cancelled() {
            return Ok(None);
        }

        let rewriter = ReflectionRewriter {
            reflection_model: self.reflection_model,
            model_id: &self.config.reflection_model,
            call_timeout: self.config.call_timeout(),
        };
        let rewrite_outcome = rewriter
            .rewrite(&parent.prompt, &parent_eval.feedbacks, &parent_eval.suggestions)
            .await;

        if let crate::reflection::RewriteOutcome::Failed { reason } = &rewrite_outcome {
            self.sink.emit(Event::ReflectionFailed {
                iteration,
                message: reason.clone(),
            });
        }

        let improved_prompt = rewrite_outcome.prompt_or(&parent.prompt);
        let improved_eval = self
            .evaluate_batch(iteration, &improved_prompt, &batch)
            .await;

        if self.cancellation.is_cancelled() {
            return Ok(None);
        }

        if improved_eval.overall_score > parent_eval.overall_score {
            let candidate_id = format!("candidate-{iteration}");
            let candidate = PromptCandidate {
                id: candidate_id.clone(),
                prompt: improved_prompt.clone(),
                metrics: improved_eval.metrics.clone(),
                overall_score: improved_eval.overall_score,
                parents: vec![parent.id.clone()],
                discovered_at_iteration: iteration,
            };

            if improved_eval.overall_score > *best_overall {
                *best_overall = improved_eval.overall_score;
                *best_candidate_id = candidate_id.clone();
            }

            info!(
                iteration,
                candidate = %candidate_id,
                prompt = %crate::telemetry::truncate(&improved_prompt, 120),
                "candidate accepted"
            );

            self.sink.emit(Event::IterationAccepted {
                iteration,
                message: format!("iteration {iteration} accepted"),
                batch_score: parent_eval.overall_score,
                improved_score: improved_eval.overall_score,
                best_score: *best_overall,
                metrics: improved_eval.metrics.clone(),
                candidate_prompt: improved_prompt,
            });

            let metrics_per_sample_overall = improved_eval
                .per_sample
                .iter()
                .map(|r| r.overall_score)
                .collect();

            Ok(Some(AcceptedCandidate {
                candidate,
                metrics_per_sample_overall,
            }))
        } else {
            self.sink.emit(Event::IterationRejected {
                iteration,
                message: format!("iteration {iteration} rejected"),
                batch_score: parent_eval.overall_score,
                improved_score: improved_eval.overall_score,
            });
            Ok(None)
        }
    }

    async fn evaluate_batch(
        &self,
        iteration: u32,
        prompt: &str,
        batch: &[Sample],
    ) -> crate::evaluator::BatchEvaluation {
        let evaluator = BatchEvaluator {
            task_model: self.task_model,
            reflection_model: self.reflection_model,
            task_model_id: &self.config.optimization_model,
            reflection_model_id: &self.config.reflection_model,
            tools: self.tools,
            dimensions: &self.dimensions,
            instructions: &self.instructions,
            max_parallel: self.config.max_parallel,
            max_steps: self.config.max_steps,
            call_timeout: self.config.call_timeout(),
            cancellation: self.cancellation,
        };

        let sink = self.sink;
        evaluator
            .evaluate(
                batch,
                prompt,
                self.config.generation_mode(),
                self.config.structured_output_schema.as_ref(),
                |index, _sample, result: &JudgeResult| {
                    sink.emit(Event::SampleGenerated {
                        iteration,
                        message: format!("sample {index} generated"),
                        sample_index: index,
                    });
                    sink.emit(Event::SampleJudged {
                        iteration,
                        message: format!("sample {index} judged"),
                        sample_index: index,
                        metrics: result.metrics.clone(),
                    });
                },
            )
            .await
    }

    /// Draws `batch_size` samples uniformly at random with replacement.
    fn draw_batch(&self) -> Vec<Sample> {
        let mut rng = rand::thread_rng();
        (0..self.config.batch_size)
            .map(|_| self.samples.iter().choose(&mut rng).expect("samples non-empty").clone())
            .collect()
    }
}

struct AcceptedCandidate {
    candidate: PromptCandidate,
    metrics_per_sample_overall: Vec<f64>,
}

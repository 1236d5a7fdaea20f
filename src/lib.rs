//! A Genetic-Pareto (GEPA) prompt optimization core.
//!
//! Given a seed system prompt, a corpus of labeled conversational [`sample::Sample`]s,
//! and two model clients (a task model that executes prompts, a reflection model that
//! judges and rewrites them), [`run::OptimizationRun`] searches for an improved prompt
//! and returns an audit trail of every candidate it tried, its score, and its standing
//! on a per-sample Pareto frontier.
//!
//! # The pipeline
//!
//! | Stage | Type | Role |
//! |-------|------|------|
//! | Generate | [`trajectory::TrajectoryGenerator`] | Runs a candidate prompt against a sample's user turn |
//! | Judge | [`judge::MetricJudge`] | Scores a trajectory across configured dimensions via LLM-as-judge |
//! | Evaluate | [`evaluator::BatchEvaluator`] | Fans a batch out across `(generate, judge)` pairs and aggregates |
//! | Reflect | [`reflection::ReflectionRewriter`] | Synthesizes an improved prompt from a batch's feedback |
//! | Track | [`pareto::ParetoFrontier`] | Maintains per-sample bests and the non-dominated candidate set |
//! | Drive | [`run::OptimizationRun`] | Orchestrates seed evaluation, iteration, acceptance, events |
//!
//! This crate does not implement an LLM provider, a chat UI, persistence, or HTTP
//! transport; it consumes an [`llm::LlmClient`] the host supplies and emits progress
//! through an [`events::EventSink`] the host supplies.
//!
//! # Quick start
//!
//! ```no_run
//! use gepa_prompt_optimizer::config::OptimizeConfig;
//! use gepa_prompt_optimizer::events::VecEventSink;
//! use gepa_prompt_optimizer::judge::PolarityInstructions;
//! use gepa_prompt_optimizer::run::{NeverCancel, OptimizationRun};
//! use gepa_prompt_optimizer::sample::{ConversationMessage, Sample};
//! use gepa_prompt_optimizer::config::DimensionSet;
//!
//! # async fn example(task_model: &dyn gepa_prompt_optimizer::llm::LlmClient,
//! #                   reflection_model: &dyn gepa_prompt_optimizer::llm::LlmClient)
//! #   -> Result<(), gepa_prompt_optimizer::error::CoreError> {
//! let config = OptimizeConfig::builder()
//!     .optimization_model("task-model-id")
//!     .reflection_model("reflection-model-id")
//!     .build();
//!
//! let sink = VecEventSink::new();
//! let run = OptimizationRun {
//!     samples: vec![Sample::new("s1", vec![ConversationMessage::user("hi")])],
//!     seed_prompt: "You are a helpful assistant.".to_string(),
//!     dimensions: DimensionSet::builtin_accuracy(),
//!     config: &config,
//!     task_model,
//!     reflection_model,
//!     tools: &[],
//!     instructions: PolarityInstructions::default(),
//!     sink: &sink,
//!     cancellation: &NeverCancel,
//! };
//! let outcome = run.run().await?;
//! println!("{}", outcome.final_prompt);
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod config;
pub mod error;
pub mod events;
pub mod evaluator;
pub mod judge;
pub mod llm;
pub mod pareto;
pub mod reflection;
pub mod run;
pub mod sample;
pub mod telemetry;
pub mod trajectory;

#[cfg(feature = "openai-client")]
pub mod openai;

pub use config::{DimensionConfig, DimensionSet, OptimizeConfig, SelectorKind};
pub use error::{ConfigError, CoreError};
pub use events::{Event, EventSink, VecEventSink};
pub use judge::{JudgeResult, MetricScores};
pub use llm::LlmClient;
pub use pareto::{ParetoFrontier, PromptCandidate};
pub use run::{OptimizationRun, RunOutcome};
pub use sample::{ContentPart, ConversationMessage, Feedback, FeedbackRating, Role, Sample};
pub use trajectory::Trajectory;

//! The host-supplied model-client contract: free-form text generation with tools,
//! schema-constrained structured generation, and judge-style object generation.
//!
//! A single `LlmClient` trait covers all three call shapes so the optimization loop
//! never needs to know which concrete provider it's driving.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::sample::ConversationMessage;

/// A tool definition exposed to the task model in `text` generation mode.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One step of a `text_generate` call: zero or more tool calls, their results (once
/// the host executes them and feeds them back), and optionally a final text answer.
#[derive(Debug, Clone, Default)]
pub struct GenerationStep {
    pub tool_calls: Vec<ToolCallRequest>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Result of a `text_generate` call: every step the model took plus the final text.
#[derive(Debug, Clone, Default)]
pub struct TextGeneration {
    pub steps: Vec<GenerationStep>,
    pub text: String,
}

/// Errors a model client may report. Every variant is recovered locally by callers —
/// none of these propagate out of the crate as a fatal error.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("structured output did not match the requested schema: {0}")]
    SchemaViolation(String),
}

/// The host-injected contract for both the task model and the reflection model.
///
/// Implementations are expected to enforce a per-call timeout themselves (or via
/// [`with_timeout`]) since the core treats every call as a suspension point that may
/// block for seconds.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Free-form generation with an optional tool surface. Used by the trajectory
    /// generator in `text` mode.
    async fn text_generate(
        &self,
        model_id: &str,
        system: &str,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<TextGeneration, LlmError>;

    /// Schema-constrained generation from a single rendered prompt. Used by the
    /// trajectory generator in `structured` mode.
    async fn structured_generate(
        &self,
        model_id: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, LlmError>;

    /// Schema-constrained object generation used by the metric judge. Distinguished
    /// from `structured_generate` because the judge's schema is fixed (one numeric
    /// field per active dimension plus two text fields) and the caller does not
    /// provide it — it's derived from `DimensionSet` (see `judge::judge_schema`).
    async fn object_generate(&self, model_id: &str, prompt: &str, schema: &Value)
        -> Result<Value, LlmError>;
}

/// Runs a future with a wall-clock timeout, converting a timeout into [`LlmError::Timeout`].
///
/// Every suspension point (generation, judging, rewriting) goes through this helper so
/// the configured call timeout is enforced uniformly without duplicating
/// `tokio::time::timeout` call sites.
pub async fn with_timeout<T, F>(duration: std::time::Duration, future: F) -> Result<T, LlmError>
where
    F: std::future::Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(duration)),
    }
}

#[cfg(test)]
pub mod test_support {
    //! Deterministic [`LlmClient`] test doubles: a queue of canned responses consumed
    //! in call order.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of text responses, one per call, across all three
    /// contract methods. Useful when a test only cares about call count and
    /// ordering, not per-method branching.
    pub struct ScriptedClient {
        text_script: Mutex<VecDeque<Result<String, LlmError>>>,
        object_script: Mutex<VecDeque<Result<Value, LlmError>>>,
    }

    impl ScriptedClient {
        pub fn new(text_script: Vec<Result<String, LlmError>>) -> Self {
            Self {
                text_script: Mutex::new(text_script.into_iter().collect()),
                object_script: Mutex::new(VecDeque::new()),
            }
        }

        pub fn with_objects(mut self, object_script: Vec<Result<Value, LlmError>>) -> Self {
            self.object_script = Mutex::new(object_script.into_iter().collect());
            self
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn text_generate(
            &self,
            _model_id: &str,
            _system: &str,
            _messages: &[ConversationMessage],
            _tools: &[ToolDefinition],
        ) -> Result<TextGeneration, LlmError> {
            let mut script = self.text_script.lock().expect("scripted client mutex poisoned");
            let text = script
                .pop_front()
                .unwrap_or_else(|| Ok("fallback response".to_string()))?;
            Ok(TextGeneration {
                steps: vec![GenerationStep {
                    tool_calls: Vec::new(),
                    text: Some(text.clone()),
                }],
                text,
            })
        }

        async fn structured_generate(
            &self,
            _model_id: &str,
            _prompt: &str,
            _schema: &Value,
        ) -> Result<Value, LlmError> {
            let mut script = self.object_script.lock().expect("scripted client mutex poisoned");
            script
                .pop_front()
                .unwrap_or_else(|| Ok(Value::Object(Default::default())))
        }

        async fn object_generate(
            &self,
            _model_id: &str,
            _prompt: &str,
            _schema: &Value,
        ) -> Result<Value, LlmError> {
            let mut script = self.object_script.lock().expect("scripted client mutex poisoned");
            script
                .pop_front()
                .unwrap_or_else(|| Ok(Value::Object(Default::default())))
        }
    }
}

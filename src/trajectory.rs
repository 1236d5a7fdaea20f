//! Runs a candidate prompt against a sample's user turn and records what the task
//! model produced.
//!
//! Generator failures are caught here and turned into the well-known error-marker
//! trajectory rather than propagated — a failed generation is a successful return
//! with a marker payload, not an exception, so the rest of the pipeline can keep
//! scoring it like any other trajectory.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::GenerationMode;
use crate::llm::{with_timeout, GenerationStep, LlmClient, LlmError, ToolDefinition};
use crate::sample::{ConversationMessage, ContentPart, Role, Sample};

pub const ERROR_MARKER: &str = "[Error generating response]";

/// A generated conversation: the sample's user turn plus whatever the candidate
/// prompt produced, rendered with the same tagged-variant content model as `Sample`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<ConversationMessage>,
}

impl Trajectory {
    fn new(messages: Vec<ConversationMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            messages,
        }
    }

    fn error_marker(user_message: ConversationMessage) -> Self {
        Self::new(vec![
            user_message,
            ConversationMessage::assistant_text(ERROR_MARKER),
        ])
    }

    /// True unless the final assistant turn is the well-known failure marker.
    pub fn is_error(&self) -> bool {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.text_content() == ERROR_MARKER)
            .unwrap_or(true)
    }
}

/// Executes a candidate prompt against a sample's user turn, in either generation
/// mode.
///
/// In `text` mode, the `max_steps` assistant/tool cycle cap is enforced by
/// truncating the step sequence `LlmClient::text_generate` returns, on top of
/// whatever bound the client itself applies.
pub struct TrajectoryGenerator<'a> {
    pub task_model: &'a dyn LlmClient,
    pub model_id: &'a str,
    pub tools: &'a [ToolDefinition],
    pub max_steps: usize,
    pub call_timeout: std::time::Duration,
}

impl<'a> TrajectoryGenerator<'a> {
    pub async fn generate(
        &self,
        sample: &Sample,
        prompt: &str,
        mode: GenerationMode,
        schema: Option<&serde_json::Value>,
    ) -> Trajectory {
        let Some(user_text) = sample.first_user_text() else {
            return Trajectory::error_marker(ConversationMessage::user(""));
        };
        let user_message = ConversationMessage::user(user_text.clone());

        match mode {
            GenerationMode::Text => self.generate_text(user_message, prompt).await,
            GenerationMode::Structured => match schema {
                Some(schema) => self.generate_structured(user_message, prompt, schema).await,
                None => Trajectory::error_marker(user_message),
            },
        }
    }

    async fn generate_text(&self, user_message: ConversationMessage, prompt: &str) -> Trajectory {
        let messages = vec![user_message.clone()];
        let result = with_timeout(
            self.call_timeout,
            self.task_model
                .text_generate(self.model_id, prompt, &messages, self.tools),
        )
        .await;

        match result {
            Ok(generation) => {
                let mut out = vec![user_message];
                for step in generation.steps.into_iter().take(self.max_steps) {
                    push_step(&mut out, step);
                }
                if !out.iter().any(|m| m.role == Role::Assistant) {
                    out.push(ConversationMessage::assistant_text(generation.text));
                }
                Trajectory::new(out)
            }
            Err(_) => Trajectory::error_marker(user_message),
        }
    }

    async fn generate_structured(
        &self,
        user_message: ConversationMessage,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Trajectory {
        let rendered_prompt = format!("{prompt}\n\nUser: {}", user_message.text_content());
        let result = with_timeout(
            self.call_timeout,
            self.task_model
                .structured_generate(self.model_id, &rendered_prompt, schema),
        )
        .await;

        match result {
            Ok(value) => {
                let serialized = serde_json::to_string(&value).unwrap_or_default();
                Trajectory::new(vec![
                    user_message,
                    ConversationMessage::assistant_text(serialized),
                ])
            }
            Err(_) => Trajectory::error_marker(user_message),
        }
    }
}

/// Appends one generation step to a trajectory's message list: a `tool-call`
/// assistant turn (if any calls occurred) followed by one `tool` turn per result,
/// then a final assistant text turn. Results are pushed immediately after the call
/// that produced them, so a tool result always follows its matching call.
fn push_step(out: &mut Vec<ConversationMessage>, step: GenerationStep) {
    if !step.tool_calls.is_empty() {
        let content = step
            .tool_calls
            .iter()
            .map(|call| ContentPart::ToolCall {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .collect();
        out.push(ConversationMessage {
            role: Role::Assistant,
            content,
        });
        for call in &step.tool_calls {
            out.push(ConversationMessage {
                role: Role::Tool,
                content: vec![ContentPart::ToolResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    text: String::new(),
                    is_error: false,
                }],
            });
        }
    }
    if let Some(text) = step.text {
        out.push(ConversationMessage::assistant_text(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedClient;

    fn sample_with_user(text: &str) -> Sample {
        Sample::new("s1", vec![ConversationMessage::user(text)])
    }

    #[tokio::test]
    async fn text_mode_returns_trajectory_with_user_and_assistant_turns() {
        let client = ScriptedClient::new(vec![Ok("hello there".to_string())]);
        let generator = TrajectoryGenerator {
            task_model: &client,
            model_id: "task-model",
            tools: &[],
            max_steps: 5,
            call_timeout: std::time::Duration::from_secs(60),
        };
        let trajectory = generator
            .generate(&sample_with_user("hi"), "be nice", GenerationMode::Text, None)
            .await;
        assert!(!trajectory.is_error());
        assert_eq!(trajectory.messages[0].role, Role::User);
        assert!(trajectory.messages.iter().any(|m| m.role == Role::Assistant));
    }

    #[tokio::test]
    async fn provider_error_yields_error_marker_trajectory() {
        let client = ScriptedClient::new(vec![Err(LlmError::Provider("boom".into()))]);
        let generator = TrajectoryGenerator {
            task_model: &client,
            model_id: "task-model",
            tools: &[],
            max_steps: 5,
            call_timeout: std::time::Duration::from_secs(60),
        };
        let trajectory = generator
            .generate(&sample_with_user("hi"), "be nice", GenerationMode::Text, None)
            .await;
        assert!(trajectory.is_error());
    }

    #[tokio::test]
    async fn structured_mode_without_schema_yields_error_marker() {
        let client = ScriptedClient::new(vec![]);
        let generator = TrajectoryGenerator {
            task_model: &client,
            model_id: "task-model",
            tools: &[],
            max_steps: 5,
            call_timeout: std::time::Duration::from_secs(60),
        };
        let trajectory = generator
            .generate(
                &sample_with_user("hi"),
                "be nice",
                GenerationMode::Structured,
                None,
            )
            .await;
        assert!(trajectory.is_error());
    }
}

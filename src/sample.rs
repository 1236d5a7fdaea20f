//! The labeled conversational corpus this crate optimizes against.
//!
//! [`Sample`] is the immutable input unit. Message content uses a tagged-variant
//! [`ContentPart`] enum rather than a dynamically-typed union of strings and part
//! sequences, so rendering and aggregation code can match exhaustively instead of
//! falling back to ad hoc formatting.

use serde::{Deserialize, Serialize};

/// Who produced a message in a sample or trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One piece of message content. Tagged by variant so rendering to the judge is
/// exhaustive and never falls back to ad hoc `Display` formatting of a `Value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        tool_call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        text: String,
        is_error: bool,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A single turn in a [`Sample`] or generated trajectory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Concatenates every `Text` part in this message, joined with `"\n"`. Tool calls
    /// and tool results are omitted.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ToolCall { .. } | ContentPart::ToolResult { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Renders the message for inclusion in a judge prompt, verbatim.
    pub fn render_verbatim(&self) -> String {
        let role = match self.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let mut rendered = format!("[{role}]");
        for part in &self.content {
            match part {
                ContentPart::Text { text } => {
                    rendered.push('\n');
                    rendered.push_str(text);
                }
                ContentPart::ToolCall {
                    tool_call_id,
                    name,
                    arguments,
                } => {
                    rendered.push_str(&format!(
                        "\n<tool-call id={tool_call_id} name={name} args={arguments}>"
                    ));
                }
                ContentPart::ToolResult {
                    tool_call_id,
                    name,
                    text,
                    is_error,
                } => {
                    rendered.push_str(&format!(
                        "\n<tool-result id={tool_call_id} name={name} error={is_error}>\n{text}"
                    ));
                }
            }
        }
        rendered
    }
}

/// Human feedback polarity attached to a recorded sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRating {
    Positive,
    Negative,
}

/// Optional human feedback recorded against a [`Sample`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub rating: FeedbackRating,
    pub comment: Option<String>,
}

impl Feedback {
    pub fn positive() -> Self {
        Self {
            rating: FeedbackRating::Positive,
            comment: None,
        }
    }

    pub fn negative() -> Self {
        Self {
            rating: FeedbackRating::Negative,
            comment: None,
        }
    }

    pub fn with_comment(rating: FeedbackRating, comment: impl Into<String>) -> Self {
        Self {
            rating,
            comment: Some(comment.into()),
        }
    }
}

/// An immutable, labeled conversational sample used as training/validation signal.
///
/// Samples are loaded once when a run starts and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub id: String,
    pub messages: Vec<ConversationMessage>,
    pub feedback: Option<Feedback>,
}

impl Sample {
    pub fn new(id: impl Into<String>, messages: Vec<ConversationMessage>) -> Self {
        Self {
            id: id.into(),
            messages,
            feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: Feedback) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Whether this sample has at least one `user` message. Samples failing this check
    /// are skipped at load time with a logged warning.
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// The first `user` message's text content, used to drive trajectory generation.
    pub fn first_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.text_content())
    }

    /// Effective feedback polarity for judge prompting: explicit feedback if present,
    /// otherwise `Positive` — absence of feedback is treated as an implicit positive
    /// example.
    pub fn effective_rating(&self) -> FeedbackRating {
        self.feedback
            .as_ref()
            .map(|f| f.rating)
            .unwrap_or(FeedbackRating::Positive)
    }
}

/// Filters a raw sample list down to samples with at least one `user` message,
/// returning the accepted samples and the ids of any skipped ones (for the caller to
/// log a warning).
pub fn filter_valid_samples(samples: Vec<Sample>) -> (Vec<Sample>, Vec<String>) {
    let mut valid = Vec::with_capacity(samples.len());
    let mut skipped = Vec::new();
    for sample in samples {
        if sample.has_user_message() {
            valid.push(sample);
        } else {
            skipped.push(sample.id);
        }
    }
    (valid, skipped)
}

//! Synthesizes an improved system prompt from a batch's accumulated feedback and
//! suggestions, via a single call to the reflection model.
//!
//! A failed or empty rewrite falls back to the current prompt unchanged rather than
//! aborting the run; the caller is told about the failure through `RewriteOutcome` so
//! it can surface a `reflection_failed` event.

use crate::llm::{with_timeout, LlmClient, LlmError};

const FEEDBACK_DELIMITER: &str = "\n\n---\n\n";

/// Outcome of one rewrite attempt. `Failed` carries the reason for the caller to emit
/// a `reflection_failed` event; the prompt to use either way is `unwrap_or_current`.
pub enum RewriteOutcome {
    Rewritten(String),
    Failed { reason: String },
}

impl RewriteOutcome {
    /// The prompt the optimization loop should evaluate next: the rewrite on success,
    /// or the unchanged current prompt on failure.
    pub fn prompt_or(&self, current_prompt: &str) -> String {
        match self {
            Self::Rewritten(prompt) => prompt.clone(),
            Self::Failed { .. } => current_prompt.to_string(),
        }
    }
}

pub struct ReflectionRewriter<'a> {
    pub reflection_model: &'a dyn LlmClient,
    pub model_id: &'a str,
    pub call_timeout: std::time::Duration,
}

impl<'a> ReflectionRewriter<'a> {
    /// Synthesizes an improved prompt from the current prompt and the batch's
    /// per-sample feedback/suggestion bundles.
    pub async fn rewrite(
        &self,
        current_prompt: &str,
        feedbacks: &[String],
        suggestions: &[String],
    ) -> RewriteOutcome {
        let meta_prompt = build_meta_prompt(current_prompt, feedbacks, suggestions);

        let result = with_timeout(
            self.call_timeout,
            self.reflection_model
                .text_generate(self.model_id, "", &[crate::sample::ConversationMessage::user(meta_prompt)], &[]),
        )
        .await;

        match result {
            Ok(generation) => {
                let trimmed = generation.text.trim().to_string();
                if trimmed.is_empty() {
                    RewriteOutcome::Failed {
                        reason: "reflection model returned an empty rewrite".to_string(),
                    }
                } else {
                    RewriteOutcome::Rewritten(trimmed)
                }
            }
            Err(err) => RewriteOutcome::Failed {
                reason: reflection_error_reason(&err),
            },
        }
    }
}

fn build_meta_prompt(current_prompt: &str, feedbacks: &[String], suggestions: &[String]) -> String {
    let feedback_block = feedbacks.join(FEEDBACK_DELIMITER);
    let suggestion_block = suggestions.join(FEEDBACK_DELIMITER);
    format!(
        "You are improving a system prompt used to drive an LLM agent.\n\n\
         Current prompt:\n{current_prompt}\n\n\
         Feedback from recent evaluations:\n{feedback_block}\n\n\
         Suggested improvements:\n{suggestion_block}\n\n\
         Address the most critical issues across these samples while preserving what \
         already works. Return only the improved prompt text, with no preamble."
    )
}

fn reflection_error_reason(err: &LlmError) -> String {
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

    #[tokio::test]
    async fn successful_rewrite_trims_whitespace() {
        let client = ScriptedClient::new(vec![Ok("  REWRITE_1  \n".to_string())]);
        let rewriter = ReflectionRewriter {
            reflection_model: &client,
            model_id: "judge-model",
            call_timeout: std::time::Duration::from_secs(60),
        };
        let outcome = rewriter
            .rewrite("seed prompt", &["fb".to_string()], &["sg".to_string()])
            .await;
        assert_eq!(outcome.prompt_or("seed prompt"), "REWRITE_1");
    }

    #[tokio::test]
    async fn failure_falls_back_to_current_prompt() {
        let client = ScriptedClient::new(vec![Err(LlmError::Provider("down".into()))]);
        let rewriter = ReflectionRewriter {
            reflection_model: &client,
            model_id: "judge-model",
            call_timeout: std::time::Duration::from_secs(60),
        };
        let outcome = rewriter
            .rewrite("seed prompt", &["fb".to_string()], &["sg".to_string()])
            .await;
        assert!(matches!(outcome, RewriteOutcome::Failed { .. }));
        assert_eq!(outcome.prompt_or("seed prompt"), "seed prompt");
    }
}

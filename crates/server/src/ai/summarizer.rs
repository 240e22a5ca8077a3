//! Interaction summarization.
//!
//! A summary failure never fails the surrounding request; the raw text's
//! first 200 characters stand in when the model has nothing to say.

use super::client::{ChatMessage, ChatModel};

const SUMMARY_PROMPT: &str =
    "Create a concise 1-2 sentence summary of the following interaction:";

const LOG_SUMMARY_PROMPT: &str = "You are an expert summarizer. Summarize the following \
interaction details concisely, focusing on key points, discussions, and outcomes. The \
summary should be suitable for a CRM interaction log.";

const FALLBACK_CHARS: usize = 200;

/// Produce a 1-2 sentence summary of the raw chat message.
pub async fn summarize(model: &impl ChatModel, raw_text: &str) -> String {
    summarize_with(model, SUMMARY_PROMPT, raw_text).await
}

/// Summary variant used when the agent logs an interaction without one.
pub async fn summarize_for_log(model: &impl ChatModel, raw_text: &str) -> String {
    summarize_with(model, LOG_SUMMARY_PROMPT, raw_text).await
}

async fn summarize_with(model: &impl ChatModel, system: &str, raw_text: &str) -> String {
    match model
        .complete(Some(system), vec![ChatMessage::user(raw_text)], None)
        .await
    {
        Ok(reply) => match reply.content {
            Some(content) if !content.trim().is_empty() => content,
            _ => head(raw_text),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Summary model call failed, falling back to raw text");
            head(raw_text)
        }
    }
}

fn head(text: &str) -> String {
    text.chars().take(FALLBACK_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::FakeModel;

    #[tokio::test]
    async fn returns_model_content() {
        let model = FakeModel::with_text(["Met Dr. X about Product Y."]);
        let summary = summarize(&model, "long raw text").await;
        assert_eq!(summary, "Met Dr. X about Product Y.");
    }

    #[tokio::test]
    async fn falls_back_to_raw_text_head_on_empty_content() {
        let model = FakeModel::with_text([""]);
        let raw = "a".repeat(300);
        let summary = summarize(&model, &raw).await;
        assert_eq!(summary.chars().count(), 200);
    }

    #[tokio::test]
    async fn falls_back_on_model_error() {
        let model = FakeModel::failing("boom");
        let summary = summarize(&model, "short text").await;
        assert_eq!(summary, "short text");
    }
}

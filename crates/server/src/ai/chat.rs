//! Single-shot chat orchestrator.
//!
//! Drives one request through an explicit state machine:
//! Extracting -> Summarizing -> Resolving -> Writing. Every model call in
//! the request shares one 30-second budget; any failure short-circuits into
//! a user-facing error message, never an HTTP error.

use std::time::Duration;

use serde::Serialize;

use crm_core::{Hcp, Interaction, InteractionPatch, NewInteraction, interaction};

use super::client::ChatModel;
use super::error::ChatError;
use super::extractor::{self, ExtractedInteraction, ExtractionDefaults};
use super::summarizer;
use crate::db::RecordStore;

/// Budget for the union of all model calls in one chat request.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire result of the chat endpoint.
#[derive(Debug, Serialize)]
pub struct ChatOutcome {
    pub status: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_object: Option<Interaction>,
}

impl ChatOutcome {
    fn success(response: String, interaction: Interaction) -> Self {
        Self {
            status: "success".to_string(),
            response,
            interaction_object: Some(interaction),
        }
    }

    fn error(response: String) -> Self {
        Self {
            status: "error".to_string(),
            response,
            interaction_object: None,
        }
    }
}

/// Orchestrator states for one chat request.
enum ChatState {
    Extracting,
    Summarizing(ExtractedInteraction),
    Resolving {
        record: ExtractedInteraction,
        summary: String,
    },
    Writing {
        record: ExtractedInteraction,
        summary: String,
        hcp: Hcp,
    },
}

/// Process a raw chat message end to end.
pub async fn process(
    model: &impl ChatModel,
    store: &impl RecordStore,
    raw_text: &str,
) -> ChatOutcome {
    match tokio::time::timeout(CHAT_TIMEOUT, drive(model, store, raw_text)).await {
        Ok(Ok((message, interaction))) => ChatOutcome::success(message, interaction),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "Chat request failed");
            ChatOutcome::error(err.to_string())
        }
        Err(_) => {
            tracing::warn!("Chat request exceeded the model-call budget");
            ChatOutcome::error(ChatError::Timeout.to_string())
        }
    }
}

/// Run the state machine to a terminal result.
async fn drive(
    model: &impl ChatModel,
    store: &impl RecordStore,
    raw_text: &str,
) -> Result<(String, Interaction), ChatError> {
    let defaults = ExtractionDefaults::now();
    let mut state = ChatState::Extracting;

    loop {
        state = match state {
            ChatState::Extracting => {
                let record = extractor::extract(model, raw_text, &defaults).await?;
                ChatState::Summarizing(record)
            }
            ChatState::Summarizing(record) => {
                let summary = summarizer::summarize(model, raw_text).await;
                ChatState::Resolving { record, summary }
            }
            ChatState::Resolving { record, summary } => {
                match store.find_hcp_by_name(&record.hcp_name).await? {
                    Some(hcp) => ChatState::Writing {
                        record,
                        summary,
                        hcp,
                    },
                    None if record.interaction_id.is_some() => {
                        return Err(ChatError::HcpNotFoundForEdit(record.hcp_name));
                    }
                    None => return Err(ChatError::HcpNotFound(record.hcp_name)),
                }
            }
            ChatState::Writing {
                record,
                summary,
                hcp,
            } => {
                return match record.interaction_id {
                    Some(id) => apply_edit(store, id, &record, &defaults, summary, raw_text, hcp.id)
                        .await,
                    None => apply_log(store, &record, summary, raw_text, hcp.id).await,
                };
            }
        };
    }
}

/// Edit path: partial update of the referenced interaction.
async fn apply_edit(
    store: &impl RecordStore,
    id: i32,
    record: &ExtractedInteraction,
    defaults: &ExtractionDefaults,
    summary: String,
    raw_text: &str,
    hcp_id: i32,
) -> Result<(String, Interaction), ChatError> {
    let patch = edit_patch(record, defaults, summary, raw_text, hcp_id);
    let updated = store
        .update_interaction(id, &patch)
        .await?
        .ok_or(ChatError::InteractionNotFound(id))?;
    let message = format!("Interaction {} updated successfully!", updated.id);
    Ok((message, updated))
}

/// Log path: create a full interaction from the extracted record.
async fn apply_log(
    store: &impl RecordStore,
    record: &ExtractedInteraction,
    summary: String,
    raw_text: &str,
    hcp_id: i32,
) -> Result<(String, Interaction), ChatError> {
    let new = NewInteraction {
        hcp_id,
        interaction_type: record.interaction_type.clone(),
        interaction_date: record.interaction_date,
        interaction_time: record.interaction_time.clone(),
        attendees: non_empty(&record.attendees),
        topics_discussed: non_empty(&record.topics_discussed),
        materials_shared: non_empty(&record.materials_shared),
        samples_distributed: non_empty(&record.samples_distributed),
        hcp_sentiment: record.hcp_sentiment,
        outcomes: non_empty(&record.outcomes),
        follow_up_actions: non_empty(&record.follow_up_actions),
        summary: Some(summary),
        raw_text_input: Some(raw_text.to_string()),
    };
    let created = store.create_interaction(&new).await?;
    let message = format!("Interaction logged for {}", record.hcp_name);
    Ok((message, created))
}

/// Build the partial update for the edit path.
///
/// Free-text fields are forwarded only when non-empty; type/date/time only
/// when they differ from the request's computed defaults (i.e. the
/// extraction evidently changed them). Sentiment, the resolved hcp_id, the
/// fresh summary, and the raw text are always forwarded.
fn edit_patch(
    record: &ExtractedInteraction,
    defaults: &ExtractionDefaults,
    summary: String,
    raw_text: &str,
    hcp_id: i32,
) -> InteractionPatch {
    let mut patch = InteractionPatch {
        hcp_id: Some(hcp_id),
        attendees: non_empty(&record.attendees),
        topics_discussed: non_empty(&record.topics_discussed),
        materials_shared: non_empty(&record.materials_shared),
        samples_distributed: non_empty(&record.samples_distributed),
        hcp_sentiment: Some(record.hcp_sentiment),
        outcomes: non_empty(&record.outcomes),
        follow_up_actions: non_empty(&record.follow_up_actions),
        summary: Some(summary),
        raw_text_input: Some(raw_text.to_string()),
        ..Default::default()
    };

    if record.interaction_type != interaction::default_interaction_type() {
        patch.interaction_type = Some(record.interaction_type.clone());
    }
    if record.interaction_date != defaults.interaction_date {
        patch.interaction_date = Some(record.interaction_date);
    }
    if record.interaction_time != defaults.interaction_time {
        patch.interaction_time = Some(record.interaction_time.clone());
    }

    patch
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{FakeModel, MemoryStore};
    use chrono::NaiveDate;
    use crm_core::Sentiment;

    fn fixed_defaults() -> ExtractionDefaults {
        ExtractionDefaults {
            interaction_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            interaction_time: "10:00".to_string(),
        }
    }

    fn extracted(defaults: &ExtractionDefaults) -> ExtractedInteraction {
        ExtractedInteraction {
            hcp_name: "Dr. Jane Smith".to_string(),
            interaction_type: "Meeting".to_string(),
            interaction_date: defaults.interaction_date,
            interaction_time: defaults.interaction_time.clone(),
            attendees: String::new(),
            topics_discussed: String::new(),
            materials_shared: String::new(),
            samples_distributed: String::new(),
            hcp_sentiment: Sentiment::Neutral,
            outcomes: String::new(),
            follow_up_actions: String::new(),
            interaction_id: None,
        }
    }

    #[test]
    fn edit_patch_skips_fields_left_at_defaults() {
        let defaults = fixed_defaults();
        let mut record = extracted(&defaults);
        record.topics_discussed = "Pricing".to_string();
        record.interaction_id = Some(42);

        let patch = edit_patch(&record, &defaults, "Sum.".to_string(), "raw", 7);

        assert_eq!(patch.hcp_id, Some(7));
        assert_eq!(patch.topics_discussed.as_deref(), Some("Pricing"));
        assert_eq!(patch.summary.as_deref(), Some("Sum."));
        assert_eq!(patch.raw_text_input.as_deref(), Some("raw"));
        assert_eq!(patch.hcp_sentiment, Some(Sentiment::Neutral));
        // Left at computed defaults, so absent from the patch.
        assert!(patch.interaction_type.is_none());
        assert!(patch.interaction_date.is_none());
        assert!(patch.interaction_time.is_none());
        assert!(patch.attendees.is_none());
        assert!(patch.outcomes.is_none());
    }

    #[test]
    fn edit_patch_forwards_changed_defaults() {
        let defaults = fixed_defaults();
        let mut record = extracted(&defaults);
        record.interaction_type = "Call".to_string();
        record.interaction_time = "14:30".to_string();

        let patch = edit_patch(&record, &defaults, String::new(), "raw", 1);

        assert_eq!(patch.interaction_type.as_deref(), Some("Call"));
        assert_eq!(patch.interaction_time.as_deref(), Some("14:30"));
        assert!(patch.interaction_date.is_none());
    }

    #[tokio::test]
    async fn log_path_creates_interaction_for_known_hcp() {
        let store = MemoryStore::new();
        store.add_hcp("Dr. Jane Smith");
        let model = FakeModel::with_text([
            "HCP Name: Dr. Jane Smith\nTopics discussed: Product X\nHCP sentiment: Positive",
            "Met Dr. Jane Smith to discuss Product X.",
        ]);

        let outcome = process(&model, &store, "Met with Dr. Jane Smith about Product X").await;

        assert_eq!(outcome.status, "success");
        assert_eq!(outcome.response, "Interaction logged for Dr. Jane Smith");
        let created = outcome.interaction_object.expect("created record");
        assert_eq!(created.topics_discussed.as_deref(), Some("Product X"));
        assert_eq!(created.hcp_sentiment, Sentiment::Positive);
        assert_eq!(
            created.summary.as_deref(),
            Some("Met Dr. Jane Smith to discuss Product X.")
        );
        assert_eq!(
            created.raw_text_input.as_deref(),
            Some("Met with Dr. Jane Smith about Product X")
        );

        // Round trip: the stored record matches what was returned.
        assert_eq!(store.get_interaction(created.id), Some(created));
    }

    #[tokio::test]
    async fn log_path_fails_for_unknown_hcp_without_writes() {
        let store = MemoryStore::new();
        let model = FakeModel::with_text([
            "HCP Name: Dr. Nobody\nTopics discussed: Product X",
            "Summary.",
        ]);

        let outcome = process(&model, &store, "Met with Dr. Nobody").await;

        assert_eq!(outcome.status, "error");
        assert_eq!(outcome.response, "HCP 'Dr. Nobody' not found");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_hcp_name_is_terminal_before_any_write() {
        let store = MemoryStore::new();
        store.add_hcp("Dr. Jane Smith");
        // No HCP Name line and no "Dr. ..." in the raw text either.
        let model = FakeModel::with_text(["Topics discussed: Product X"]);

        let outcome = process(&model, &store, "met the team about Product X").await;

        assert_eq!(outcome.status, "error");
        assert_eq!(
            outcome.response,
            "Could not identify HCP name from your input. Please specify the HCP (e.g., 'Dr. John Doe')."
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn hcp_name_fallback_recovers_from_raw_text() {
        let store = MemoryStore::new();
        store.add_hcp("Dr. Jane Smith");
        // Model response carries no HCP Name line.
        let model = FakeModel::with_text([
            "Topics discussed: Product X\nHCP sentiment: Positive",
            "Summary.",
        ]);

        let outcome = process(
            &model,
            &store,
            "Met with Dr. Jane Smith, discussed Product X, she seemed positive",
        )
        .await;

        assert_eq!(outcome.status, "success");
        let created = outcome.interaction_object.unwrap();
        assert_eq!(created.hcp_id, store.hcp_id("Dr. Jane Smith").unwrap());
    }

    #[tokio::test]
    async fn extraction_without_content_is_terminal() {
        let store = MemoryStore::new();
        let model = FakeModel::with_text([""]);

        let outcome = process(&model, &store, "anything").await;

        assert_eq!(outcome.status, "error");
        assert_eq!(
            outcome.response,
            "AI agent could not extract information. Please try rephrasing."
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn edit_path_updates_with_resolved_hcp_id() {
        let store = MemoryStore::new();
        let old_hcp = store.add_hcp("Dr. Old");
        let new_hcp = store.add_hcp("Dr. New");
        let existing = store.add_interaction(old_hcp, "2025-05-20");

        let extraction =
            format!("HCP Name: Dr. New\nInteraction ID: {existing}\nTopics discussed: Pricing");
        let model = FakeModel::with_text([extraction.as_str(), "Corrected the record."]);

        let outcome = process(&model, &store, "edit that interaction, should be Dr. New").await;

        assert_eq!(outcome.status, "success");
        assert_eq!(
            outcome.response,
            format!("Interaction {existing} updated successfully!")
        );
        let updated = store.get_interaction(existing).unwrap();
        assert_eq!(updated.hcp_id, new_hcp);
        assert_eq!(updated.topics_discussed.as_deref(), Some("Pricing"));
        // Fields the extraction left at defaults were not touched.
        assert_eq!(updated.interaction_time, "09:00");
        assert_eq!(updated.attendees, None);
    }

    #[tokio::test]
    async fn edit_path_reports_unknown_interaction_id() {
        let store = MemoryStore::new();
        store.add_hcp("Dr. New");
        let model = FakeModel::with_text([
            "HCP Name: Dr. New\nInteraction ID: 999",
            "Summary.",
        ]);

        let outcome = process(&model, &store, "edit interaction 999").await;

        assert_eq!(outcome.status, "error");
        assert_eq!(outcome.response, "Interaction with ID 999 not found.");
    }

    #[tokio::test]
    async fn edit_path_requires_existing_hcp() {
        let store = MemoryStore::new();
        let model = FakeModel::with_text([
            "HCP Name: Dr. Ghost\nInteraction ID: 1",
            "Summary.",
        ]);

        let outcome = process(&model, &store, "edit interaction 1 for Dr. Ghost").await;

        assert_eq!(outcome.status, "error");
        assert_eq!(
            outcome.response,
            "HCP 'Dr. Ghost' not found for editing interaction. Please create it first."
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn model_stall_times_out_without_writes() {
        let store = MemoryStore::new();
        store.add_hcp("Dr. Jane Smith");
        let model = FakeModel::stalled();

        let outcome = process(&model, &store, "Met with Dr. Jane Smith").await;

        assert_eq!(outcome.status, "error");
        assert_eq!(
            outcome.response,
            "AI processing timed out. Please try again or simplify your request."
        );
        assert_eq!(store.write_count(), 0);
    }
}

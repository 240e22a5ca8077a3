//! Structured field extraction from free-text interaction reports.
//!
//! One model call produces a line-oriented key-value response; the regex
//! parsing of that response is the compatibility surface with the model's
//! expected output format and lives in the pure `parse_response`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crm_core::{Sentiment, interaction};

use super::client::{ChatMessage, ChatModel};
use super::error::ChatError;

const EXTRACTION_PROMPT: &str = "You are an AI assistant for logging and editing HCP interactions. \
Your primary goal is to extract specific details from the user's message \
and output them in a structured, concise manner, ideally as key-value pairs. \
Always prioritize extracting the HCP name if it is mentioned or implied. \
Extract the following: \
1. HCP name (e.g., 'Dr. Jane Smith') \
2. Topics discussed \
3. Materials shared \
4. Samples distributed \
5. HCP sentiment (Positive, Neutral, Negative) \
6. Outcomes \
7. Follow-up actions \
8. If the user is referring to a specific interaction ID (e.g., 'interaction 123'), extract that too. \
If a detail is not present or implies 'none', indicate 'Not mentioned' or leave it blank. \
Example: 'HCP Name: Dr. Emily White. Topics: Product X. Sentiment: Positive. Interaction ID: Not mentioned.'";

/// Values the model uses to mark an absent field.
const ABSENT_SENTINELS: [&str; 4] = ["not mentioned", "n/a", "none", "unknown"];

static SENTIMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)HCP sentiment:\s*(.+)").unwrap());
static INTERACTION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Interaction ID:\s*(\d+)").unwrap());
static DECORATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*+\s*|\s*\*+$").unwrap());
static DR_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Dr\.?\s?\w+\s?\w+").unwrap());

/// The six labeled fields besides sentiment, in fixed match order.
#[derive(Clone, Copy)]
enum Field {
    HcpName,
    TopicsDiscussed,
    MaterialsShared,
    SamplesDistributed,
    Outcomes,
    FollowUpActions,
}

static FIELD_PATTERNS: LazyLock<Vec<(Field, Regex)>> = LazyLock::new(|| {
    vec![
        (Field::HcpName, Regex::new(r"(?i)HCP Name:\s*(.+)").unwrap()),
        (
            Field::TopicsDiscussed,
            Regex::new(r"(?i)Topics discussed:\s*(.+)").unwrap(),
        ),
        (
            Field::MaterialsShared,
            Regex::new(r"(?i)Materials shared:\s*(.+)").unwrap(),
        ),
        (
            Field::SamplesDistributed,
            Regex::new(r"(?i)Samples distributed:\s*(.+)").unwrap(),
        ),
        (Field::Outcomes, Regex::new(r"(?i)Outcomes:\s*(.+)").unwrap()),
        (
            Field::FollowUpActions,
            Regex::new(r"(?i)Follow-up actions:\s*(.+)").unwrap(),
        ),
    ]
});

/// Defaults computed once per request, used both to fill unextracted fields
/// and later to detect which fields the extraction evidently changed.
#[derive(Debug, Clone)]
pub struct ExtractionDefaults {
    pub interaction_date: NaiveDate,
    pub interaction_time: String,
}

impl ExtractionDefaults {
    pub fn now() -> Self {
        Self {
            interaction_date: interaction::today(),
            interaction_time: interaction::now_hhmm(),
        }
    }
}

/// Normalized output of the field extractor.
#[derive(Debug, Clone)]
pub struct ExtractedInteraction {
    pub hcp_name: String,
    pub interaction_type: String,
    pub interaction_date: NaiveDate,
    pub interaction_time: String,
    pub attendees: String,
    pub topics_discussed: String,
    pub materials_shared: String,
    pub samples_distributed: String,
    pub hcp_sentiment: Sentiment,
    pub outcomes: String,
    pub follow_up_actions: String,
    /// Present when the request refers to an existing interaction (edit).
    pub interaction_id: Option<i32>,
}

impl ExtractedInteraction {
    fn with_defaults(defaults: &ExtractionDefaults) -> Self {
        Self {
            hcp_name: String::new(),
            interaction_type: interaction::default_interaction_type(),
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
}

/// Run the extraction model call and parse its response.
pub async fn extract(
    model: &impl ChatModel,
    raw_text: &str,
    defaults: &ExtractionDefaults,
) -> Result<ExtractedInteraction, ChatError> {
    let reply = model
        .complete(Some(EXTRACTION_PROMPT), vec![ChatMessage::user(raw_text)], None)
        .await
        .map_err(ChatError::Unexpected)?;

    let content = match reply.content {
        Some(c) if !c.trim().is_empty() => c,
        _ => return Err(ChatError::NoContent),
    };
    tracing::debug!(response = %content, "Extraction model response");

    let mut record = parse_response(&content, defaults);

    // Last resort: look for a "Dr. <first> <last>" in the original message.
    if record.hcp_name.is_empty() {
        if let Some(name) = fallback_hcp_name(raw_text) {
            tracing::debug!(hcp_name = %name, "HCP name recovered from raw message");
            record.hcp_name = name;
        }
    }

    if record.hcp_name.is_empty() {
        return Err(ChatError::NoHcpName);
    }

    Ok(record)
}

/// Parse the model's line-oriented key-value response into a typed record.
///
/// One field assignment per line, first pattern wins; the sentiment pattern
/// is always tried first. Sentinel values ("Not mentioned" etc.) become
/// empty strings.
pub fn parse_response(response: &str, defaults: &ExtractionDefaults) -> ExtractedInteraction {
    let mut record = ExtractedInteraction::with_defaults(defaults);

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = SENTIMENT_RE.captures(line) {
            let value = strip_decoration(&caps[1]);
            if let Some(sentiment) = Sentiment::classify(&value) {
                record.hcp_sentiment = sentiment;
            }
            continue;
        }

        for (field, pattern) in FIELD_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(line) {
                let value = strip_decoration(&caps[1]);
                let value = if is_absent_sentinel(&value) {
                    String::new()
                } else {
                    value
                };
                match field {
                    Field::HcpName => record.hcp_name = value,
                    Field::TopicsDiscussed => record.topics_discussed = value,
                    Field::MaterialsShared => record.materials_shared = value,
                    Field::SamplesDistributed => record.samples_distributed = value,
                    Field::Outcomes => record.outcomes = value,
                    Field::FollowUpActions => record.follow_up_actions = value,
                }
                break;
            }
        }
    }

    // The model occasionally slips a sentinel past the per-line check for
    // these two fields; re-check them after the full pass.
    if is_absent_sentinel(&record.materials_shared) {
        record.materials_shared = String::new();
    }
    if is_absent_sentinel(&record.samples_distributed) {
        record.samples_distributed = String::new();
    }

    record.interaction_id = INTERACTION_ID_RE
        .captures(response)
        .and_then(|caps| caps[1].parse::<i32>().ok());

    record
}

/// First "Dr. <word> <word>" occurrence in the raw message, if any.
pub fn fallback_hcp_name(raw_text: &str) -> Option<String> {
    DR_NAME_RE
        .find(raw_text)
        .map(|m| m.as_str().trim().to_string())
}

/// Strip leading/trailing asterisk decoration and surrounding whitespace.
fn strip_decoration(value: &str) -> String {
    DECORATION_RE.replace_all(value.trim(), "").trim().to_string()
}

fn is_absent_sentinel(value: &str) -> bool {
    let lower = value.to_lowercase();
    ABSENT_SENTINELS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ExtractionDefaults {
        ExtractionDefaults {
            interaction_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            interaction_time: "10:00".to_string(),
        }
    }

    #[test]
    fn parses_all_labeled_fields() {
        let response = "HCP Name: Dr. Emily White\n\
                        Topics discussed: Product X efficacy\n\
                        Materials shared: Brochure\n\
                        Samples distributed: Sample A\n\
                        HCP sentiment: Positive\n\
                        Outcomes: Agreed to trial\n\
                        Follow-up actions: Send study data";
        let record = parse_response(response, &defaults());

        assert_eq!(record.hcp_name, "Dr. Emily White");
        assert_eq!(record.topics_discussed, "Product X efficacy");
        assert_eq!(record.materials_shared, "Brochure");
        assert_eq!(record.samples_distributed, "Sample A");
        assert_eq!(record.hcp_sentiment, Sentiment::Positive);
        assert_eq!(record.outcomes, "Agreed to trial");
        assert_eq!(record.follow_up_actions, "Send study data");
        assert_eq!(record.interaction_id, None);
    }

    #[test]
    fn sentiment_asterisk_decoration_is_stripped() {
        let record = parse_response("HCP sentiment: **Positive**", &defaults());
        assert_eq!(record.hcp_sentiment, Sentiment::Positive);
    }

    #[test]
    fn sentiment_classified_by_substring() {
        let record = parse_response("HCP sentiment: seemed quite negative today", &defaults());
        assert_eq!(record.hcp_sentiment, Sentiment::Negative);
    }

    #[test]
    fn unrecognized_sentiment_keeps_default() {
        let record = parse_response("HCP sentiment: hard to say", &defaults());
        assert_eq!(record.hcp_sentiment, Sentiment::Neutral);
    }

    #[test]
    fn sentinel_values_become_empty_per_field() {
        for sentinel in ["Not mentioned", "N/A", "none", "UNKNOWN"] {
            let response = format!(
                "HCP Name: {sentinel}\n\
                 Topics discussed: {sentinel}\n\
                 Materials shared: {sentinel}\n\
                 Samples distributed: {sentinel}\n\
                 Outcomes: {sentinel}\n\
                 Follow-up actions: {sentinel}"
            );
            let record = parse_response(&response, &defaults());
            assert_eq!(record.hcp_name, "", "sentinel {sentinel}");
            assert_eq!(record.topics_discussed, "");
            assert_eq!(record.materials_shared, "");
            assert_eq!(record.samples_distributed, "");
            assert_eq!(record.outcomes, "");
            assert_eq!(record.follow_up_actions, "");
        }
    }

    #[test]
    fn value_asterisks_are_stripped() {
        let record = parse_response("Topics discussed: **Product X**", &defaults());
        assert_eq!(record.topics_discussed, "Product X");
    }

    #[test]
    fn one_field_assignment_per_line_first_pattern_wins() {
        // Both labels appear on one line; HCP Name is tried first and its
        // capture swallows the rest of the line.
        let record = parse_response(
            "HCP Name: Dr. A. Topics discussed: Product X",
            &defaults(),
        );
        assert_eq!(record.hcp_name, "Dr. A. Topics discussed: Product X");
        assert_eq!(record.topics_discussed, "");
    }

    #[test]
    fn interaction_id_scanned_across_response() {
        let record = parse_response(
            "HCP Name: Dr. B\nInteraction ID: 42\nTopics discussed: Pricing",
            &defaults(),
        );
        assert_eq!(record.interaction_id, Some(42));
    }

    #[test]
    fn non_numeric_interaction_id_is_ignored() {
        let record = parse_response("Interaction ID: Not mentioned", &defaults());
        assert_eq!(record.interaction_id, None);
    }

    #[test]
    fn defaults_fill_unmatched_fields() {
        let record = parse_response("nothing structured here", &defaults());
        assert_eq!(record.interaction_type, "Meeting");
        assert_eq!(record.interaction_date, defaults().interaction_date);
        assert_eq!(record.interaction_time, "10:00");
        assert_eq!(record.hcp_sentiment, Sentiment::Neutral);
        assert_eq!(record.hcp_name, "");
    }

    #[test]
    fn fallback_extracts_doctor_name_from_raw_text() {
        let name = fallback_hcp_name(
            "Met with Dr. Jane Smith, discussed Product X, she seemed positive",
        );
        assert_eq!(name.as_deref(), Some("Dr. Jane Smith"));
    }

    #[test]
    fn fallback_handles_missing_period() {
        let name = fallback_hcp_name("quick call with dr Lee Wong yesterday");
        assert_eq!(name.as_deref(), Some("dr Lee Wong"));
    }

    #[test]
    fn fallback_returns_none_without_doctor_mention() {
        assert_eq!(fallback_hcp_name("lunch with the pharmacy team"), None);
    }
}

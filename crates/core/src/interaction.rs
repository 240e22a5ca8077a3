//! Interaction types and partial-update semantics

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::sentiment::Sentiment;

/// A recorded encounter (meeting/call/email) with an HCP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i32,
    pub hcp_id: i32,
    pub interaction_type: String,
    pub interaction_date: NaiveDate,
    /// Free-text clock string, e.g. "19:36".
    pub interaction_time: String,
    pub attendees: Option<String>,
    pub topics_discussed: Option<String>,
    pub materials_shared: Option<String>,
    pub samples_distributed: Option<String>,
    pub hcp_sentiment: Sentiment,
    pub outcomes: Option<String>,
    pub follow_up_actions: Option<String>,
    /// Model-generated summary of the raw input.
    pub summary: Option<String>,
    /// Verbatim original message the record was extracted from.
    pub raw_text_input: Option<String>,
}

/// Payload for logging a new interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInteraction {
    pub hcp_id: i32,
    #[serde(default = "default_interaction_type")]
    pub interaction_type: String,
    #[serde(default = "today")]
    pub interaction_date: NaiveDate,
    #[serde(default = "now_hhmm")]
    pub interaction_time: String,
    #[serde(default)]
    pub attendees: Option<String>,
    #[serde(default)]
    pub topics_discussed: Option<String>,
    #[serde(default)]
    pub materials_shared: Option<String>,
    #[serde(default)]
    pub samples_distributed: Option<String>,
    #[serde(default)]
    pub hcp_sentiment: Sentiment,
    #[serde(default)]
    pub outcomes: Option<String>,
    #[serde(default)]
    pub follow_up_actions: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub raw_text_input: Option<String>,
}

/// Partial update of an interaction.
///
/// Absent fields are left untouched, never cleared. Applying the same patch
/// twice yields the same record as applying it once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionPatch {
    #[serde(default)]
    pub hcp_id: Option<i32>,
    #[serde(default)]
    pub interaction_type: Option<String>,
    #[serde(default)]
    pub interaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub interaction_time: Option<String>,
    #[serde(default)]
    pub attendees: Option<String>,
    #[serde(default)]
    pub topics_discussed: Option<String>,
    #[serde(default)]
    pub materials_shared: Option<String>,
    #[serde(default)]
    pub samples_distributed: Option<String>,
    #[serde(default)]
    pub hcp_sentiment: Option<Sentiment>,
    #[serde(default)]
    pub outcomes: Option<String>,
    #[serde(default)]
    pub follow_up_actions: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub raw_text_input: Option<String>,
}

impl InteractionPatch {
    pub fn is_empty(&self) -> bool {
        self.hcp_id.is_none()
            && self.interaction_type.is_none()
            && self.interaction_date.is_none()
            && self.interaction_time.is_none()
            && self.attendees.is_none()
            && self.topics_discussed.is_none()
            && self.materials_shared.is_none()
            && self.samples_distributed.is_none()
            && self.hcp_sentiment.is_none()
            && self.outcomes.is_none()
            && self.follow_up_actions.is_none()
            && self.summary.is_none()
            && self.raw_text_input.is_none()
    }

    /// Apply every present field to the record, leaving the rest untouched.
    pub fn apply_to(&self, interaction: &mut Interaction) {
        if let Some(v) = self.hcp_id {
            interaction.hcp_id = v;
        }
        if let Some(v) = &self.interaction_type {
            interaction.interaction_type = v.clone();
        }
        if let Some(v) = self.interaction_date {
            interaction.interaction_date = v;
        }
        if let Some(v) = &self.interaction_time {
            interaction.interaction_time = v.clone();
        }
        if let Some(v) = &self.attendees {
            interaction.attendees = Some(v.clone());
        }
        if let Some(v) = &self.topics_discussed {
            interaction.topics_discussed = Some(v.clone());
        }
        if let Some(v) = &self.materials_shared {
            interaction.materials_shared = Some(v.clone());
        }
        if let Some(v) = &self.samples_distributed {
            interaction.samples_distributed = Some(v.clone());
        }
        if let Some(v) = self.hcp_sentiment {
            interaction.hcp_sentiment = v;
        }
        if let Some(v) = &self.outcomes {
            interaction.outcomes = Some(v.clone());
        }
        if let Some(v) = &self.follow_up_actions {
            interaction.follow_up_actions = Some(v.clone());
        }
        if let Some(v) = &self.summary {
            interaction.summary = Some(v.clone());
        }
        if let Some(v) = &self.raw_text_input {
            interaction.raw_text_input = Some(v.clone());
        }
    }
}

pub fn default_interaction_type() -> String {
    "Meeting".to_string()
}

/// Today's calendar date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current local time as an "HH:MM" clock string.
pub fn now_hhmm() -> String {
    Local::now().format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Interaction {
        Interaction {
            id: 1,
            hcp_id: 3,
            interaction_type: "Meeting".to_string(),
            interaction_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            interaction_time: "09:30".to_string(),
            attendees: Some("Nurse Joy".to_string()),
            topics_discussed: Some("Product X".to_string()),
            materials_shared: None,
            samples_distributed: None,
            hcp_sentiment: Sentiment::Neutral,
            outcomes: None,
            follow_up_actions: None,
            summary: None,
            raw_text_input: None,
        }
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut record = sample();
        let patch = InteractionPatch {
            topics_discussed: Some("Product Y".to_string()),
            hcp_sentiment: Some(Sentiment::Positive),
            ..Default::default()
        };

        patch.apply_to(&mut record);

        assert_eq!(record.topics_discussed.as_deref(), Some("Product Y"));
        assert_eq!(record.hcp_sentiment, Sentiment::Positive);
        // Untouched fields survive.
        assert_eq!(record.attendees.as_deref(), Some("Nurse Joy"));
        assert_eq!(record.interaction_time, "09:30");
    }

    #[test]
    fn patch_application_is_idempotent() {
        let patch = InteractionPatch {
            hcp_id: Some(9),
            outcomes: Some("Agreed to trial".to_string()),
            summary: Some("Short summary".to_string()),
            ..Default::default()
        };

        let mut once = sample();
        patch.apply_to(&mut once);

        let mut twice = sample();
        patch.apply_to(&mut twice);
        patch.apply_to(&mut twice);

        assert_eq!(once, twice);
    }

    #[test]
    fn empty_patch_detected() {
        assert!(InteractionPatch::default().is_empty());
        let patch = InteractionPatch {
            attendees: Some(String::new()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn new_interaction_fills_defaults_from_json() {
        let parsed: NewInteraction = serde_json::from_str(r#"{"hcp_id": 5}"#).unwrap();
        assert_eq!(parsed.interaction_type, "Meeting");
        assert_eq!(parsed.hcp_sentiment, Sentiment::Neutral);
        assert_eq!(parsed.interaction_date, today());
    }
}

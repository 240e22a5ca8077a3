//! HCP sentiment classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Observed or inferred sentiment of an HCP during an interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Error returned when a string is not a recognized sentiment.
#[derive(Debug, Error)]
#[error("invalid sentiment: {0}")]
pub struct ParseSentimentError(pub String);

impl Sentiment {
    /// Classify free text by case-insensitive substring containment.
    ///
    /// "positive" wins over "negative" wins over "neutral"; returns None when
    /// none of the three substrings appear, letting the caller keep whatever
    /// value was previously set.
    pub fn classify(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("positive") {
            Some(Sentiment::Positive)
        } else if lower.contains("negative") {
            Some(Sentiment::Negative)
        } else if lower.contains("neutral") {
            Some(Sentiment::Neutral)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = ParseSentimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Positive" => Ok(Sentiment::Positive),
            "Neutral" => Ok(Sentiment::Neutral),
            "Negative" => Ok(Sentiment::Negative),
            other => Err(ParseSentimentError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_substrings() {
        assert_eq!(Sentiment::classify("Very Positive"), Some(Sentiment::Positive));
        assert_eq!(Sentiment::classify("somewhat negative"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::classify("NEUTRAL overall"), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::classify("indifferent"), None);
    }

    #[test]
    fn classify_positive_wins_on_ambiguity() {
        assert_eq!(
            Sentiment::classify("positive with some negative notes"),
            Some(Sentiment::Positive)
        );
    }

    #[test]
    fn round_trips_through_str() {
        for s in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
            assert_eq!(s.as_str().parse::<Sentiment>().unwrap(), s);
        }
        assert!("positive".parse::<Sentiment>().is_err());
    }
}

//! AI insight model (summary, sentiment, urgency)

use serde::{Deserialize, Serialize};

/// Summary used when the model produced none
pub const NO_SUMMARY: &str = "No summary available";

/// Overall tone of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    #[default]
    Unknown,
}

impl Sentiment {
    /// Lenient parse: matches the leading word, case-insensitively
    pub fn parse_label(s: &str) -> Self {
        match leading_word(s).as_str() {
            "positive" => Self::Positive,
            "neutral" => Self::Neutral,
            "negative" => Self::Negative,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// How soon a message needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Urgency {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Urgency {
    /// Lenient parse: matches the leading word, case-insensitively
    pub fn parse_label(s: &str) -> Self {
        match leading_word(s).as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Result of analyzing one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
}

impl Insights {
    pub fn new(summary: impl Into<String>, sentiment: Sentiment, urgency: Urgency) -> Self {
        Self {
            summary: summary.into(),
            sentiment,
            urgency,
        }
    }
}

impl Default for Insights {
    fn default() -> Self {
        Self::new(NO_SUMMARY, Sentiment::Unknown, Urgency::Unknown)
    }
}

fn leading_word(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\'')
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_parse_label() {
        assert_eq!(Sentiment::parse_label("Positive"), Sentiment::Positive);
        assert_eq!(Sentiment::parse_label("  negative."), Sentiment::Negative);
        assert_eq!(
            Sentiment::parse_label("**Neutral** (mostly informational)"),
            Sentiment::Neutral
        );
        assert_eq!(Sentiment::parse_label("mixed"), Sentiment::Unknown);
        assert_eq!(Sentiment::parse_label(""), Sentiment::Unknown);
    }

    #[test]
    fn test_urgency_parse_label() {
        assert_eq!(Urgency::parse_label("HIGH - reply today"), Urgency::High);
        assert_eq!(Urgency::parse_label("Medium"), Urgency::Medium);
        assert_eq!(Urgency::parse_label("low"), Urgency::Low);
        assert_eq!(Urgency::parse_label("n/a"), Urgency::Unknown);
    }

    #[test]
    fn test_default_insights() {
        let insights = Insights::default();
        assert_eq!(insights.summary, NO_SUMMARY);
        assert_eq!(insights.sentiment, Sentiment::Unknown);
        assert_eq!(insights.urgency, Urgency::Unknown);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(Sentiment::Negative.to_string(), "Negative");
        assert_eq!(Urgency::High.to_string(), "High");
    }
}

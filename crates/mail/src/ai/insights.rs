//! Email insight extraction
//!
//! The model is asked for JSON, but replies come back in several shapes:
//! fenced JSON, `Summary:`-style lines, or free prose. Parsing accepts all
//! three and never fails.

use anyhow::Result;
use log::debug;
use serde::Deserialize;

use super::TextGenerator;
use crate::models::{Insights, NO_SUMMARY, Sentiment, Urgency};

/// Prompt asking for a summary, sentiment and urgency as JSON
pub fn insights_prompt(subject: &str, body: &str) -> String {
    format!(
        r#"You are an AI email assistant. Analyze the following email and provide:
1. A concise summary (2-3 sentences).
2. The sentiment (Positive, Neutral, Negative).
3. The urgency (High, Medium, Low).

Return the result as JSON like:
{{"summary": "...", "sentiment": "Positive | Neutral | Negative", "urgency": "High | Medium | Low"}}

Email Subject: {}
Email Body: {}
"#,
        subject, body
    )
}

/// Run the model over one email and parse its answer
pub fn analyze(generator: &dyn TextGenerator, subject: &str, body: &str) -> Result<Insights> {
    let text = generator.generate(&insights_prompt(subject, body))?;
    let insights = parse_insights(&text);
    debug!(
        "Insights: sentiment={} urgency={}",
        insights.sentiment, insights.urgency
    );
    Ok(insights)
}

#[derive(Debug, Default, Deserialize)]
struct RawInsights {
    summary: Option<String>,
    sentiment: Option<String>,
    urgency: Option<String>,
}

impl RawInsights {
    fn is_empty(&self) -> bool {
        self.summary.is_none() && self.sentiment.is_none() && self.urgency.is_none()
    }

    fn into_insights(self) -> Insights {
        Insights {
            summary: self
                .summary
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| NO_SUMMARY.to_string()),
            sentiment: self
                .sentiment
                .map_or(Sentiment::Unknown, |s| Sentiment::parse_label(&s)),
            urgency: self
                .urgency
                .map_or(Urgency::Unknown, |s| Urgency::parse_label(&s)),
        }
    }
}

/// Parse a model answer into insights
///
/// JSON first, then labelled lines. If neither yields a field, the whole
/// answer becomes the summary with unknown sentiment and medium urgency.
pub fn parse_insights(text: &str) -> Insights {
    let text = strip_code_fence(text);
    if text.is_empty() {
        return Insights::default();
    }

    if let Ok(raw) = serde_json::from_str::<RawInsights>(text)
        && !raw.is_empty()
    {
        return raw.into_insights();
    }

    let labelled = parse_labelled_lines(text);
    if !labelled.is_empty() {
        return labelled.into_insights();
    }

    Insights::new(text, Sentiment::Unknown, Urgency::Medium)
}

/// Remove a surrounding markdown code fence (with optional language tag)
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_labelled_lines(text: &str) -> RawInsights {
    let mut raw = RawInsights::default();
    for line in text.lines() {
        if raw.summary.is_none() {
            raw.summary = labelled_value(line, "summary:");
        }
        if raw.sentiment.is_none() {
            raw.sentiment = labelled_value(line, "sentiment:");
        }
        if raw.urgency.is_none() {
            raw.urgency = labelled_value(line, "urgency:");
        }
    }
    raw
}

/// Text after `label` (lowercase, matched case-insensitively) on this line
fn labelled_value(line: &str, label: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `line`
    let start = line.to_ascii_lowercase().find(label)? + label.len();
    let value = line[start..]
        .trim()
        .trim_start_matches(['*', '_'])
        .trim();
    Some(value.to_string())
}

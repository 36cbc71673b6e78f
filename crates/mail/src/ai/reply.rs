//! Reply drafting

use anyhow::Result;

use super::TextGenerator;
use crate::models::Insights;

/// Prompt for a polite, professional reply to `content`
pub fn reply_prompt(content: &str, insights: &Insights) -> String {
    let insights_json = serde_json::to_string(insights).unwrap_or_default();
    format!(
        r#"You are an assistant writing a professional email reply.

Email content:
{}

AI Insights:
{}

Write a polite, clear, and professional reply:
"#,
        content, insights_json
    )
}

/// Ask the model for a reply; the result is trimmed and never empty
pub fn draft_reply(
    generator: &dyn TextGenerator,
    content: &str,
    insights: &Insights,
) -> Result<String> {
    let reply = generator.generate(&reply_prompt(content, insights))?;
    let reply = reply.trim();
    anyhow::ensure!(!reply.is_empty(), "Model returned an empty reply");
    Ok(reply.to_string())
}

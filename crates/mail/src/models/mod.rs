//! Domain models for triage entities

mod insights;
mod message;
mod reply;

pub use insights::{Insights, NO_SUMMARY, Sentiment, Urgency};
pub use message::{EmailAddress, EmailMessage, MessageId, OutgoingEmail};
pub use reply::{NewReply, ReplyId, ReplyRecord};

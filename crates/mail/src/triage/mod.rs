//! Triage service
//!
//! Composes the mailbox, the language model, reply storage and the session
//! manager into the operations a front end exposes.

mod service;

pub use service::{AnalyzedEmail, StatusReport, TriageService};

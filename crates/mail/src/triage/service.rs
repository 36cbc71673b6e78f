//! Triage operations over one session

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::ai::{TextGenerator, insights, reply};
use crate::auth::{SessionManager, TokenState};
use crate::config::TriageSettings;
use crate::error::{TriageError, require};
use crate::gmail::Mailbox;
use crate::models::{
    EmailMessage, Insights, MessageId, NewReply, OutgoingEmail, ReplyId, ReplyRecord,
};
use crate::storage::ReplyStore;

/// A fetched email with its analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzedEmail {
    pub email: EmailMessage,
    pub insights: Insights,
    /// Replies already drafted for this email, most recent first
    pub replies: Vec<ReplyRecord>,
}

/// Configuration and connectivity diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub session_id: String,
    /// OAuth client id and secret are both present
    pub provider_configured: bool,
    /// The language model has an API key
    pub llm_configured: bool,
    /// Stored reply count, `None` if the store could not be read
    pub reply_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
    /// Session token state, `None` when signed out
    pub session_state: Option<TokenState>,
}

impl StatusReport {
    pub fn signed_in(&self) -> bool {
        self.session_state.is_some()
    }
}

/// Triage operations for one session
pub struct TriageService {
    sessions: Arc<SessionManager>,
    session_id: String,
    mailbox: Arc<dyn Mailbox>,
    generator: Arc<dyn TextGenerator>,
    replies: Arc<dyn ReplyStore>,
    settings: TriageSettings,
}

impl TriageService {
    pub fn new(
        sessions: Arc<SessionManager>,
        session_id: impl Into<String>,
        mailbox: Arc<dyn Mailbox>,
        generator: Arc<dyn TextGenerator>,
        replies: Arc<dyn ReplyStore>,
        settings: TriageSettings,
    ) -> Self {
        Self {
            sessions,
            session_id: session_id.into(),
            mailbox,
            generator,
            replies,
            settings,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn settings(&self) -> &TriageSettings {
        &self.settings
    }

    /// Newest messages, fetched in full
    ///
    /// `limit` defaults to the configured inbox size; the configured search
    /// query, if any, filters the listing.
    pub fn inbox(&self, limit: Option<usize>) -> Result<Vec<EmailMessage>> {
        let limit = limit.unwrap_or(self.settings.inbox_limit);
        let ids = self
            .mailbox
            .list_message_ids(limit, self.settings.inbox_query.as_deref())?;

        let messages = ids
            .iter()
            .take(limit)
            .map(|id| self.mailbox.fetch_message(id))
            .collect::<Result<Vec<_>>>()?;

        info!("Fetched {} inbox messages", messages.len());
        Ok(messages)
    }

    /// Fetch one email and analyze it
    pub fn open_email(&self, id: &str) -> Result<AnalyzedEmail> {
        let id = require(id, "id")?;
        let email = self.mailbox.fetch_message(&MessageId::new(id.trim()))?;

        let text = email.analysis_text();
        let insights = if text.trim().is_empty() {
            Insights::default()
        } else {
            insights::analyze(self.generator.as_ref(), &email.subject, text)
                .with_context(|| format!("Failed to analyze email {}", email.id))?
        };

        let replies = self.replies.replies_for_email(email.id.as_str())?;

        Ok(AnalyzedEmail {
            email,
            insights,
            replies,
        })
    }

    /// Summary, sentiment and urgency for arbitrary email text
    pub fn insights(&self, subject: &str, body: &str) -> Result<Insights> {
        let body = require(body, "body")?;
        insights::analyze(self.generator.as_ref(), subject, body)
    }

    /// Draft a reply with the model and store it
    pub fn draft_reply(
        &self,
        email_id: &str,
        content: &str,
        insights: &Insights,
    ) -> Result<ReplyRecord> {
        let email_id = require(email_id, "emailId")?;
        let content = require(content, "emailContent")?;

        let ai_reply = reply::draft_reply(self.generator.as_ref(), content, insights)
            .context("Failed to generate reply")?;

        let record = self.replies.insert_reply(NewReply::new(
            email_id.trim(),
            content,
            insights.clone(),
            ai_reply,
        ))?;

        info!("Stored reply {} for email {}", record.id, record.email_id);
        Ok(record)
    }

    /// Stored replies, newest first
    pub fn recent_replies(&self, limit: usize) -> Result<Vec<ReplyRecord>> {
        self.replies.recent_replies(limit)
    }

    /// Send a message through the session's mailbox
    ///
    /// When `reply_id` names a stored reply it is marked sent afterwards.
    ///
    /// # Errors
    /// `MissingField` for blank fields, `NotAuthenticated` / `SessionExpired`
    /// without a usable session, `ReplyNotFound` for an unknown `reply_id`.
    pub fn send_reply(
        &self,
        to: &str,
        subject: &str,
        message: &str,
        reply_id: Option<ReplyId>,
    ) -> Result<MessageId> {
        let to = require(to, "to")?;
        let subject = require(subject, "subject")?;
        let message = require(message, "message")?;

        // Fail before touching the provider when the session can't be used
        self.sessions.access_token(&self.session_id)?;

        if let Some(id) = reply_id
            && self.replies.get_reply(id)?.is_none()
        {
            return Err(TriageError::ReplyNotFound(id).into());
        }

        let sent_id = self
            .mailbox
            .send_message(&OutgoingEmail::new(to.trim(), subject.trim(), message))?;
        info!("Sent message {}", sent_id);

        if let Some(id) = reply_id
            && !self.replies.mark_sent(id)?
        {
            warn!("Reply {} disappeared before it could be marked sent", id);
        }

        Ok(sent_id)
    }

    /// Send a stored reply back to the sender of the email it answers
    pub fn send_draft(&self, reply_id: ReplyId) -> Result<MessageId> {
        let reply = self
            .replies
            .get_reply(reply_id)?
            .ok_or(TriageError::ReplyNotFound(reply_id))?;

        let original = self
            .mailbox
            .fetch_message(&MessageId::new(reply.email_id.as_str()))?;
        let to = original.sender();
        anyhow::ensure!(
            !to.email.is_empty(),
            "Email {} has no sender to reply to",
            original.id
        );

        self.send_reply(
            &to.display(),
            &original.reply_subject(),
            &reply.ai_reply,
            Some(reply_id),
        )
    }

    /// Diagnostics for credentials, model, storage and session
    pub fn status(&self) -> Result<StatusReport> {
        let (reply_count, storage_error) = match self.replies.count_replies() {
            Ok(count) => (Some(count), None),
            Err(e) => (None, Some(format!("{:#}", e))),
        };

        Ok(StatusReport {
            session_id: self.session_id.clone(),
            provider_configured: self.sessions.provider().is_complete(),
            llm_configured: self.generator.is_configured(),
            reply_count,
            storage_error,
            session_state: self.sessions.state(&self.session_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ConsentResponse, RefreshError, RefreshResponse, SessionToken, TokenEndpoint};
    use crate::config::ProviderConfig;
    use crate::models::{Sentiment, Urgency};
    use crate::storage::{InMemoryReplyStore, InMemorySessionStore, SessionStore};
    use std::sync::Mutex;

    struct NoRefresh;

    impl TokenEndpoint for NoRefresh {
        fn refresh(&self, _: &ProviderConfig, _: &str) -> Result<RefreshResponse, RefreshError> {
            Err(RefreshError::Status(400))
        }

        fn exchange_code(&self, _: &ProviderConfig, _: &str, _: &str) -> Result<ConsentResponse> {
            anyhow::bail!("not used")
        }
    }

    #[derive(Default)]
    struct FakeMailbox {
        messages: Vec<EmailMessage>,
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl Mailbox for FakeMailbox {
        fn list_message_ids(&self, max_results: usize, _query: Option<&str>) -> Result<Vec<MessageId>> {
            Ok(self.messages.iter().take(max_results).map(|m| m.id.clone()).collect())
        }

        fn fetch_message(&self, id: &MessageId) -> Result<EmailMessage> {
            self.messages
                .iter()
                .find(|m| &m.id == id)
                .cloned()
                .with_context(|| format!("no message {}", id))
        }

        fn send_message(&self, email: &OutgoingEmail) -> Result<MessageId> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(email.clone());
            Ok(MessageId::new(format!("sent-{}", sent.len())))
        }
    }

    struct Canned(&'static str);

    impl TextGenerator for Canned {
        fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Fixture {
        service: TriageService,
        mailbox: Arc<FakeMailbox>,
        sessions: Arc<InMemorySessionStore>,
    }

    fn fixture(answer: &'static str, signed_in: bool) -> Fixture {
        let sessions = Arc::new(InMemorySessionStore::new());
        if signed_in {
            sessions
                .put_session("s1", &SessionToken::new("A1", Some("R1".to_string()), i64::MAX))
                .unwrap();
        }
        let manager = Arc::new(SessionManager::new(
            ProviderConfig::google("client", "secret"),
            Arc::new(NoRefresh),
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
        ));

        let mailbox = Arc::new(FakeMailbox {
            messages: vec![
                EmailMessage::new("m1")
                    .with_subject("Server down")
                    .with_from("Ops <ops@example.com>")
                    .with_body("Production is down, please help."),
                EmailMessage::new("m2").with_subject("Empty").with_from("x@example.com"),
            ],
            ..Default::default()
        });

        let service = TriageService::new(
            manager,
            "s1",
            Arc::clone(&mailbox) as Arc<dyn Mailbox>,
            Arc::new(Canned(answer)),
            Arc::new(InMemoryReplyStore::new()),
            TriageSettings::default(),
        );
        Fixture {
            service,
            mailbox,
            sessions,
        }
    }

    const ANSWER: &str = r#"{"summary":"Outage","sentiment":"Negative","urgency":"High"}"#;

    fn auth_error(err: &anyhow::Error) -> Option<&TriageError> {
        err.downcast_ref::<TriageError>()
    }

    #[test]
    fn test_inbox_respects_limit() {
        let f = fixture(ANSWER, true);
        assert_eq!(f.service.inbox(None).unwrap().len(), 2);
        assert_eq!(f.service.inbox(Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_open_email_analyzes_body() {
        let f = fixture(ANSWER, true);
        let analyzed = f.service.open_email("m1").unwrap();
        assert_eq!(analyzed.email.subject, "Server down");
        assert_eq!(
            analyzed.insights,
            Insights::new("Outage", Sentiment::Negative, Urgency::High)
        );
    }

    #[test]
    fn test_open_email_lists_earlier_drafts() {
        let f = fixture("Looking into it.", true);
        assert!(f.service.open_email("m1").unwrap().replies.is_empty());

        let draft = f
            .service
            .draft_reply("m1", "Production is down", &Insights::default())
            .unwrap();
        f.service
            .draft_reply("m2", "Unrelated", &Insights::default())
            .unwrap();

        let analyzed = f.service.open_email("m1").unwrap();
        assert_eq!(analyzed.replies, vec![draft]);
    }

    #[test]
    fn test_open_email_without_text_skips_model() {
        let f = fixture(ANSWER, true);
        assert_eq!(f.service.open_email("m2").unwrap().insights, Insights::default());
    }

    #[test]
    fn test_insights_requires_body() {
        let f = fixture(ANSWER, true);
        let err = f.service.insights("subject", "  ").unwrap_err();
        assert_eq!(auth_error(&err), Some(&TriageError::MissingField("body")));
    }

    #[test]
    fn test_draft_reply_persists_record() {
        let f = fixture("  Thanks, on it.  ", true);
        let insights = Insights::new("Outage", Sentiment::Negative, Urgency::High);

        let record = f
            .service
            .draft_reply("m1", "Production is down", &insights)
            .unwrap();

        assert_eq!(record.ai_reply, "Thanks, on it.");
        assert_eq!(record.insights, insights);
        assert!(!record.sent);
        assert_eq!(f.service.recent_replies(10).unwrap(), vec![record]);
    }

    #[test]
    fn test_draft_reply_requires_fields() {
        let f = fixture("reply", true);
        let err = f.service.draft_reply("", "content", &Insights::default()).unwrap_err();
        assert_eq!(auth_error(&err), Some(&TriageError::MissingField("emailId")));
        let err = f.service.draft_reply("m1", "", &Insights::default()).unwrap_err();
        assert_eq!(auth_error(&err), Some(&TriageError::MissingField("emailContent")));
    }

    #[test]
    fn test_send_reply_requires_session() {
        let f = fixture("reply", false);
        let err = f.service.send_reply("a@example.com", "Hi", "Hello", None).unwrap_err();
        assert_eq!(auth_error(&err), Some(&TriageError::NotAuthenticated));
        assert!(f.mailbox.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_reply_with_expired_unrefreshable_session() {
        let f = fixture("reply", false);
        f.sessions
            .put_session("s1", &SessionToken::new("A1", Some("R1".to_string()), 0))
            .unwrap();

        let err = f.service.send_reply("a@example.com", "Hi", "Hello", None).unwrap_err();
        assert_eq!(auth_error(&err), Some(&TriageError::SessionExpired));
        assert!(f.mailbox.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_reply_requires_fields() {
        let f = fixture("reply", true);
        let err = f.service.send_reply("a@example.com", "", "Hello", None).unwrap_err();
        assert_eq!(auth_error(&err), Some(&TriageError::MissingField("subject")));
    }

    #[test]
    fn test_send_reply_marks_record_sent() {
        let f = fixture("Thanks!", true);
        let record = f
            .service
            .draft_reply("m1", "content", &Insights::default())
            .unwrap();

        f.service
            .send_reply("ops@example.com", "Re: Server down", &record.ai_reply, Some(record.id))
            .unwrap();

        assert!(f.service.recent_replies(1).unwrap()[0].sent);
        let sent = f.mailbox.sent.lock().unwrap();
        assert_eq!(sent[0], OutgoingEmail::new("ops@example.com", "Re: Server down", "Thanks!"));
    }

    #[test]
    fn test_send_reply_unknown_reply_id() {
        let f = fixture("reply", true);
        let err = f
            .service
            .send_reply("a@example.com", "Hi", "Hello", Some(ReplyId(77)))
            .unwrap_err();
        assert_eq!(auth_error(&err), Some(&TriageError::ReplyNotFound(ReplyId(77))));
        assert!(f.mailbox.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_draft_replies_to_sender() {
        let f = fixture("On it.", true);
        let record = f
            .service
            .draft_reply("m1", "Production is down", &Insights::default())
            .unwrap();

        f.service.send_draft(record.id).unwrap();

        let sent = f.mailbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "Ops <ops@example.com>");
        assert_eq!(sent[0].subject, "Re: Server down");
        assert_eq!(sent[0].body, "On it.");
    }

    #[test]
    fn test_status_report() {
        let f = fixture("reply", true);
        let status = f.service.status().unwrap();
        assert!(status.provider_configured);
        assert!(status.llm_configured);
        assert_eq!(status.reply_count, Some(0));
        assert_eq!(status.session_state, Some(TokenState::Fresh));
        assert!(status.signed_in());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["sessionState"], "Fresh");
        assert!(json.get("storageError").is_none());
    }

    #[test]
    fn test_status_signed_out() {
        let f = fixture("reply", false);
        let status = f.service.status().unwrap();
        assert_eq!(status.session_state, None);
        assert!(!status.signed_in());
    }
}

//! Integration tests for the mail crate
//!
//! These tests drive the public API end to end: the token lifecycle against a
//! local token endpoint, session persistence on disk, and triage operations
//! over SQLite with a fake mailbox and model.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use mail::auth::{RefreshError, now_millis};
use mail::storage::MAX_RECENT_REPLIES;
use mail::{
    ConsentResponse, EmailMessage, FileSessionStore, HttpTokenEndpoint, Insights, Mailbox,
    MessageId, OutgoingEmail, ProviderConfig, SessionManager, SessionStore, SessionToken,
    SqliteReplyStore, TextGenerator, TokenEndpoint, TokenError, TokenState, TriageError,
    TriageService, TriageSettings, Urgency, ensure_fresh_token, ensure_fresh_token_at,
};
use tempfile::TempDir;

// === Local token endpoint ===

/// Serve one HTTP response on a loopback port; the handle yields the request
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/token", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);

        let mut head = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap();
            }
            head.push_str(&line);
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        reader.get_mut().write_all(response.as_bytes()).unwrap();

        head + &String::from_utf8(request_body).unwrap()
    });

    (url, handle)
}

fn provider_at(token_url: &str) -> ProviderConfig {
    ProviderConfig::google("client-1", "secret-1").with_token_url(token_url)
}

fn expired_record(now: i64) -> SessionToken {
    SessionToken::new("A1", Some("R1".to_string()), now - 1000)
}

#[test]
fn test_refresh_success_over_http() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"access_token":"A2","expires_in":3600,"token_type":"Bearer"}"#,
    );
    let now = now_millis();

    let record = ensure_fresh_token_at(expired_record(now), &provider_at(&url), &HttpTokenEndpoint, now);

    assert_eq!(
        record,
        SessionToken::new("A2", Some("R1".to_string()), now + 3_600_000)
    );

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /token"));
    assert!(request.contains("grant_type=refresh_token"));
    assert!(request.contains("refresh_token=R1"));
    assert!(request.contains("client_id=client-1"));
    assert!(request.contains("client_secret=secret-1"));
}

#[test]
fn test_refresh_rejected_over_http() {
    let (url, server) = serve_once("400 Bad Request", r#"{"error":"invalid_grant"}"#);
    let now = now_millis();

    let record = ensure_fresh_token_at(expired_record(now), &provider_at(&url), &HttpTokenEndpoint, now);

    let mut expected = expired_record(now);
    expected.error = Some(TokenError::RefreshFailed);
    assert_eq!(record, expected);
    server.join().unwrap();
}

#[test]
fn test_refresh_with_malformed_body_over_http() {
    let (url, server) = serve_once("200 OK", r#"{"token_type":"Bearer"}"#);

    let result = HttpTokenEndpoint.refresh(&provider_at(&url), "R1");

    assert!(matches!(result, Err(RefreshError::Malformed(_))));
    server.join().unwrap();
}

#[test]
fn test_refresh_with_unreachable_endpoint_is_flagged() {
    // Bind then drop to get a port nobody listens on
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let provider = provider_at(&format!("http://127.0.0.1:{}/token", port));
    let now = now_millis();

    let record = ensure_fresh_token_at(expired_record(now), &provider, &HttpTokenEndpoint, now);

    assert_eq!(record.error, Some(TokenError::RefreshFailed));
    assert_eq!(record.access_token, "A1");
}

#[test]
fn test_fresh_record_makes_no_request() {
    // Nothing listens here; a request would flag the record
    let provider = provider_at("http://127.0.0.1:9/token");
    let record = SessionToken::new("A1", Some("R1".to_string()), now_millis() + 60_000);

    let result = ensure_fresh_token(record.clone(), &provider, &HttpTokenEndpoint);

    assert_eq!(result, record);
}

// === Session persistence ===

#[test]
fn test_session_lifecycle_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.json");
    let (url, server) = serve_once("200 OK", r#"{"access_token":"A2","expires_in":120}"#);

    let sessions = SessionManager::new(
        provider_at(&url),
        Arc::new(HttpTokenEndpoint),
        Arc::new(FileSessionStore::new(&path)),
    );

    // Consent with an absolute expiry already in the past
    let past_secs = now_millis() / 1000 - 10;
    sessions
        .sign_in(
            "s1",
            ConsentResponse::new("A1")
                .with_refresh_token("R1")
                .with_expires_at(past_secs),
        )
        .unwrap();
    assert_eq!(
        sessions.state("s1").unwrap(),
        Some(TokenState::ExpiredPendingRefresh)
    );

    assert_eq!(sessions.access_token("s1").unwrap(), "A2");
    server.join().unwrap();

    // A second manager over the same file sees the refreshed record
    let reopened = FileSessionStore::new(&path);
    let stored = reopened.get_session("s1").unwrap().unwrap();
    assert_eq!(stored.access_token, "A2");
    assert_eq!(stored.refresh_token.as_deref(), Some("R1"));
    assert_eq!(stored.state(now_millis()), TokenState::Fresh);
}

#[test]
fn test_consent_without_refresh_token_fails_locally() {
    let dir = TempDir::new().unwrap();
    let sessions = SessionManager::new(
        provider_at("http://127.0.0.1:9/token"),
        Arc::new(HttpTokenEndpoint),
        Arc::new(FileSessionStore::new(dir.path().join("sessions.json"))),
    );

    sessions
        .sign_in("s1", ConsentResponse::new("A1").with_expires_at(1))
        .unwrap();

    let err = sessions.access_token("s1").unwrap_err();
    assert_eq!(
        err.downcast_ref::<TriageError>(),
        Some(&TriageError::SessionExpired)
    );
    assert_eq!(sessions.state("s1").unwrap(), Some(TokenState::Errored));

    // Re-consent replaces the errored record
    sessions
        .sign_in("s1", ConsentResponse::new("A9").with_refresh_token("R9"))
        .unwrap();
    assert_eq!(sessions.access_token("s1").unwrap(), "A9");
}

// === Triage over SQLite ===

struct FakeMailbox {
    messages: Vec<EmailMessage>,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl Mailbox for FakeMailbox {
    fn list_message_ids(&self, max_results: usize, _query: Option<&str>) -> Result<Vec<MessageId>> {
        Ok(self
            .messages
            .iter()
            .take(max_results)
            .map(|m| m.id.clone())
            .collect())
    }

    fn fetch_message(&self, id: &MessageId) -> Result<EmailMessage> {
        self.messages
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .with_context(|| format!("no message {}", id))
    }

    fn send_message(&self, email: &OutgoingEmail) -> Result<MessageId> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(MessageId::new("sent-1"))
    }
}

/// Answers insight prompts with labelled lines and reply prompts with prose
struct ScriptedModel;

impl TextGenerator for ScriptedModel {
    fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.contains("professional email reply") {
            Ok("Hi Dana,\n\nThanks for the heads-up. I'll review the contract today.\n".to_string())
        } else {
            Ok("Summary: Contract needs review.\nSentiment: Neutral\nUrgency: High".to_string())
        }
    }
}

struct Harness {
    service: TriageService,
    mailbox: Arc<FakeMailbox>,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();

    let sessions = Arc::new(SessionManager::new(
        ProviderConfig::google("client", "secret"),
        Arc::new(HttpTokenEndpoint),
        Arc::new(FileSessionStore::new(dir.path().join("sessions.json"))),
    ));
    sessions
        .sign_in(
            "s1",
            ConsentResponse::new("A1")
                .with_refresh_token("R1")
                .with_expires_in(3600),
        )
        .unwrap();

    let mailbox = Arc::new(FakeMailbox {
        messages: vec![
            EmailMessage::new("m1")
                .with_thread_id("t1")
                .with_subject("Contract")
                .with_from("\"Dana Smith\" <dana@example.com>")
                .with_body("Please review the attached contract before Friday."),
            EmailMessage::new("m2")
                .with_subject("Newsletter")
                .with_from("news@example.com")
                .with_snippet("This week in Rust"),
        ],
        sent: Mutex::new(Vec::new()),
    });

    let replies = Arc::new(SqliteReplyStore::new(dir.path().join("replies.test.sqlite")).unwrap());

    let service = TriageService::new(
        sessions,
        "s1",
        Arc::clone(&mailbox) as Arc<dyn Mailbox>,
        Arc::new(ScriptedModel),
        replies,
        TriageSettings::default(),
    );

    Harness {
        service,
        mailbox,
        _dir: dir,
    }
}

#[test]
fn test_open_draft_send_flow() {
    let h = harness();

    let inbox = h.service.inbox(None).unwrap();
    assert_eq!(inbox.len(), 2);

    let analyzed = h.service.open_email("m1").unwrap();
    assert_eq!(analyzed.insights.summary, "Contract needs review.");
    assert_eq!(analyzed.insights.urgency, Urgency::High);

    let reply = h
        .service
        .draft_reply("m1", &analyzed.email.body, &analyzed.insights)
        .unwrap();
    assert!(reply.ai_reply.starts_with("Hi Dana,"));
    assert!(!reply.ai_reply.ends_with('\n'));

    h.service.send_draft(reply.id).unwrap();

    let sent = h.mailbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "Dana Smith <dana@example.com>");
    assert_eq!(sent[0].subject, "Re: Contract");

    let stored = h.service.recent_replies(5).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].sent);
    drop(sent);

    let reopened = h.service.open_email("m1").unwrap();
    assert_eq!(reopened.replies, stored);
    assert!(h.service.open_email("m2").unwrap().replies.is_empty());
}

#[test]
fn test_snippet_is_analyzed_when_body_is_empty() {
    let h = harness();
    let analyzed = h.service.open_email("m2").unwrap();
    assert_eq!(analyzed.insights.summary, "Contract needs review.");
}

#[test]
fn test_recent_replies_capped() {
    let h = harness();
    for i in 0..(MAX_RECENT_REPLIES + 3) {
        h.service
            .draft_reply(&format!("m{}", i), "content", &Insights::default())
            .unwrap();
    }

    let replies = h.service.recent_replies(500).unwrap();
    assert_eq!(replies.len(), MAX_RECENT_REPLIES);
    assert_eq!(replies[0].email_id, format!("m{}", MAX_RECENT_REPLIES + 2));
}

#[test]
fn test_send_after_sign_out_is_not_authenticated() {
    let h = harness();
    h.service.sessions().sign_out("s1").unwrap();

    let err = h
        .service
        .send_reply("dana@example.com", "Re: Contract", "Done", None)
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<TriageError>(),
        Some(&TriageError::NotAuthenticated)
    );
    assert!(h.mailbox.sent.lock().unwrap().is_empty());
}

#[test]
fn test_status_reflects_storage_and_session() {
    let h = harness();
    h.service
        .draft_reply("m1", "content", &Insights::default())
        .unwrap();

    let status = h.service.status().unwrap();
    assert_eq!(status.reply_count, Some(1));
    assert_eq!(status.session_state, Some(TokenState::Fresh));
    assert!(status.provider_configured);
}

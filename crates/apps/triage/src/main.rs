//! Triage - AI-assisted Gmail triage from the command line
//!
//! Every command prints JSON on stdout. Failures print `{"error": ...}` on
//! stderr and exit with 2 when signing in again is the remedy, 1 otherwise.

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use mail::auth::consent::sign_in_interactive;
use mail::{
    FileSessionStore, GeminiClient, GmailClient, HttpTokenEndpoint, Mailbox, ProviderConfig,
    SessionManager, SqliteReplyStore, TriageError, TriageService, TriageSettings,
};

mod cli;

use cli::{Cli, Command};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = serde_json::json!({ "error": format!("{:#}", e) });
            eprintln!("{}", body);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<TriageError>() {
        Some(e) if e.is_auth() => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    config::init().context("Failed to initialize config directory")?;
    let service = build_service(&cli.session, cli.credentials.as_deref())?;

    match cli.command {
        Command::Login => {
            let token = sign_in_interactive(service.sessions(), service.session_id())?;
            print_json(&serde_json::json!({
                "signedIn": true,
                "session": service.session_id(),
                "expiresAt": token.expires_at,
                "hasRefreshToken": token.refresh_token.is_some(),
            }))
        }
        Command::Logout => {
            service.sessions().sign_out(service.session_id())?;
            print_json(&serde_json::json!({ "signedIn": false, "session": service.session_id() }))
        }
        Command::Status => print_json(&service.status()?),
        Command::Inbox { limit } => print_json(&service.inbox(limit)?),
        Command::Show { id } => print_json(&service.open_email(&id)?),
        Command::Insights { subject, body } => print_json(&service.insights(&subject, &body)?),
        Command::Draft { email_id, content } => {
            let (content, insights) = match content {
                Some(content) => {
                    let insights = service.insights("", &content)?;
                    (content, insights)
                }
                None => {
                    let analyzed = service.open_email(&email_id)?;
                    (analyzed.email.analysis_text().to_string(), analyzed.insights)
                }
            };
            print_json(&service.draft_reply(&email_id, &content, &insights)?)
        }
        Command::Replies { limit } => print_json(&service.recent_replies(limit)?),
        Command::Send {
            to,
            subject,
            message,
            reply_id,
        } => {
            let id = service.send_reply(&to, &subject, &message, reply_id)?;
            print_json(&serde_json::json!({ "success": true, "messageId": id.as_str() }))
        }
        Command::SendDraft { reply_id } => {
            let id = service.send_draft(reply_id)?;
            print_json(&serde_json::json!({ "success": true, "messageId": id.as_str() }))
        }
    }
}

/// Wire the Gmail, Gemini and storage implementations for one session
fn build_service(session_id: &str, credentials: Option<&Path>) -> Result<TriageService> {
    let settings = TriageSettings::load().context("Failed to load triage.json")?;
    let provider = load_provider(credentials)?;

    let sessions_path = settings
        .sessions_path()
        .context("Could not determine session file path")?;
    let database_path = settings
        .database_path()
        .context("Could not determine database path")?;

    let sessions = Arc::new(SessionManager::new(
        provider,
        Arc::new(HttpTokenEndpoint),
        Arc::new(FileSessionStore::new(sessions_path)),
    ));
    let mailbox: Arc<dyn Mailbox> = Arc::new(GmailClient::new(Arc::clone(&sessions), session_id));
    let generator = Arc::new(GeminiClient::new(
        mail::config::gemini_api_key(),
        settings.gemini_model.clone(),
    ));
    let replies = Arc::new(SqliteReplyStore::new(&database_path)?);

    Ok(TriageService::new(
        sessions, session_id, mailbox, generator, replies, settings,
    ))
}

/// OAuth client from an explicit file, or the usual lookup order
///
/// An explicit file that can't be read is an error; a missing default only
/// warns so that commands not needing a sign-in still run.
fn load_provider(credentials: Option<&Path>) -> Result<ProviderConfig> {
    if let Some(path) = credentials {
        return ProviderConfig::from_file(path)
            .with_context(|| format!("Failed to load credentials from {}", path.display()));
    }

    Ok(ProviderConfig::load().unwrap_or_else(|e| {
        warn!("OAuth credentials not found: {:#}", e);
        if let Some(path) = ProviderConfig::default_credentials_path() {
            warn!(
                "To sign in, either:\n\
                 1. Place your Google OAuth credentials at: {}\n\
                 2. Pass --credentials <PATH>\n\
                 3. Or set environment variables: GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET",
                path.display()
            );
        }
        ProviderConfig::google("", "")
    }))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_auth_errors() {
        assert_eq!(exit_code(&TriageError::NotAuthenticated.into()), 2);
        assert_eq!(exit_code(&TriageError::SessionExpired.into()), 2);
        assert_eq!(exit_code(&TriageError::MissingField("to").into()), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("network down")), 1);
    }

    #[test]
    fn test_exit_code_through_context() {
        let err = anyhow::Error::from(TriageError::SessionExpired).context("Failed to list inbox");
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_load_provider_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"installed":{"client_id":"cli-id","client_secret":"cli-secret"}}"#,
        )
        .unwrap();

        let provider = load_provider(Some(&path)).unwrap();
        assert_eq!(provider.client_id, "cli-id");
        assert!(provider.is_complete());
    }

    #[test]
    fn test_load_provider_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_provider(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(format!("{:#}", err).contains("absent.json"));
    }
}

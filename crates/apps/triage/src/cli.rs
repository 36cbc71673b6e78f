use clap::{Parser, Subcommand};
use mail::ReplyId;
use std::path::PathBuf;

/// AI-assisted Gmail triage: read, analyze, draft and send replies
#[derive(Clone, Debug, Parser)]
#[command(name = "triage", version, about, long_about = None)]
pub struct Cli {
    /// Session whose tokens are used
    #[arg(long, global = true, env = "TRIAGE_SESSION", default_value = "default")]
    pub session: String,

    /// Google OAuth client JSON to use instead of the config directory's
    #[arg(long, global = true, env = "TRIAGE_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Sign in through the browser consent flow
    Login,

    /// Forget the session's tokens
    Logout,

    /// Show credential, model, storage and session diagnostics
    Status,

    /// List the newest inbox messages
    Inbox {
        /// Number of messages (defaults to `inbox_limit` in triage.json)
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Show one message with its summary, sentiment and urgency
    Show {
        /// Gmail message id
        id: String,
    },

    /// Analyze arbitrary email text
    Insights {
        #[arg(long, default_value = "")]
        subject: String,

        #[arg(long)]
        body: String,
    },

    /// Draft and store a reply to a message
    Draft {
        /// Gmail message id the reply answers
        email_id: String,

        /// Text to reply to; the message body is fetched when omitted
        #[arg(long)]
        content: Option<String>,
    },

    /// List stored replies, newest first
    Replies {
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },

    /// Send a message
    Send {
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        message: String,

        /// Stored reply to mark as sent
        #[arg(long)]
        reply_id: Option<ReplyId>,
    },

    /// Send a stored reply to the sender of the message it answers
    SendDraft { reply_id: ReplyId },
}

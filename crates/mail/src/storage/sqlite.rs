//! SQLite-based reply storage

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{ReplyStore, clamp_recent_limit};
use crate::models::{Insights, NewReply, ReplyId, ReplyRecord};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE replies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email_id TEXT NOT NULL,
                original_content TEXT NOT NULL,
                insights TEXT NOT NULL,  -- JSON
                ai_reply TEXT NOT NULL,
                sent INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,  -- epoch millis
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX idx_replies_created_at ON replies(created_at DESC, id DESC);
            CREATE INDEX idx_replies_email_id ON replies(email_id);
            "#,
        ),
    ])
}

const REPLY_COLUMNS: &str =
    "id, email_id, original_content, insights, ai_reply, sent, created_at, updated_at";

/// SQLite-based reply store
pub struct SqliteReplyStore {
    conn: Mutex<Connection>,
}

impl SqliteReplyStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_to_reply(row: &Row<'_>) -> rusqlite::Result<RawReply> {
        Ok(RawReply {
            id: row.get(0)?,
            email_id: row.get(1)?,
            original_content: row.get(2)?,
            insights: row.get(3)?,
            ai_reply: row.get(4)?,
            sent: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

/// A reply row before JSON and timestamp decoding
struct RawReply {
    id: i64,
    email_id: String,
    original_content: String,
    insights: String,
    ai_reply: String,
    sent: bool,
    created_at: i64,
    updated_at: i64,
}

impl RawReply {
    fn into_record(self) -> Result<ReplyRecord> {
        let insights: Insights = serde_json::from_str(&self.insights)
            .with_context(|| format!("Corrupt insights for reply {}", self.id))?;
        Ok(ReplyRecord {
            id: ReplyId(self.id),
            email_id: self.email_id,
            original_content: self.original_content,
            insights,
            ai_reply: self.ai_reply,
            sent: self.sent,
            created_at: millis_to_datetime(self.created_at)?,
            updated_at: millis_to_datetime(self.updated_at)?,
        })
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("Invalid timestamp {}", ms))
}

/// Current time truncated to the stored precision
fn now_truncated() -> Result<(i64, DateTime<Utc>)> {
    let ms = Utc::now().timestamp_millis();
    Ok((ms, millis_to_datetime(ms)?))
}

impl ReplyStore for SqliteReplyStore {
    fn insert_reply(&self, reply: NewReply) -> Result<ReplyRecord> {
        let insights = serde_json::to_string(&reply.insights)?;
        let (now_ms, now) = now_truncated()?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO replies (email_id, original_content, insights, ai_reply, sent, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
            params![
                reply.email_id,
                reply.original_content,
                insights,
                reply.ai_reply,
                now_ms,
                now_ms
            ],
        )
        .context("Failed to insert reply")?;
        let id = ReplyId(conn.last_insert_rowid());

        Ok(ReplyRecord::from_new(id, reply, now))
    }

    fn get_reply(&self, id: ReplyId) -> Result<Option<ReplyRecord>> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM replies WHERE id = ?", REPLY_COLUMNS),
                [id.0],
                Self::row_to_reply,
            )
            .optional()?;

        raw.map(RawReply::into_record).transpose()
    }

    fn recent_replies(&self, limit: usize) -> Result<Vec<ReplyRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM replies ORDER BY created_at DESC, id DESC LIMIT ?",
            REPLY_COLUMNS
        ))?;

        let rows = stmt
            .query_map([clamp_recent_limit(limit) as i64], Self::row_to_reply)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawReply::into_record).collect()
    }

    fn replies_for_email(&self, email_id: &str) -> Result<Vec<ReplyRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM replies WHERE email_id = ? ORDER BY created_at DESC, id DESC",
            REPLY_COLUMNS
        ))?;

        let rows = stmt
            .query_map([email_id], Self::row_to_reply)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawReply::into_record).collect()
    }

    fn mark_sent(&self, id: ReplyId) -> Result<bool> {
        let (now_ms, _) = now_truncated()?;
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE replies SET sent = 1, updated_at = ? WHERE id = ?",
            params![now_ms, id.0],
        )?;
        Ok(updated > 0)
    }

    fn count_replies(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM replies", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

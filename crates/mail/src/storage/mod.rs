//! Storage traits and implementations
//!
//! Reply records and session tokens sit behind traits so the service can run
//! against in-memory stores in tests and SQLite / a JSON file otherwise.

mod memory;
mod session_file;
mod sqlite;
mod traits;

pub use memory::{InMemoryReplyStore, InMemorySessionStore};
pub use session_file::FileSessionStore;
pub use sqlite::SqliteReplyStore;
pub use traits::{MAX_RECENT_REPLIES, ReplyStore, SessionStore};

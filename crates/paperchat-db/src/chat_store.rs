use chrono::{DateTime, NaiveDateTime, Utc};
use paperchat_common::{Error, Result};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id INTEGER,
        sender TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (conversation_id) REFERENCES conversations (id)
    );
";

/// A stored conversation. Rows are created by `new_chat` and never change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

/// One message of a conversation, shaped for the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub sender: Sender,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }

    fn from_db(value: &str) -> Result<Self> {
        match value {
            "user" => Ok(Self::User),
            "ai" => Ok(Self::Ai),
            other => Err(Error::Database(format!("unknown sender: {other}"))),
        }
    }
}

/// Backing store for conversations and their message history.
pub struct ChatStore {
    conn: Mutex<Connection>,
}

impl ChatStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening chat store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open chat database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Database(format!("chat store migration failed: {e}")))?;

        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("chat database lock poisoned".into()))
    }

    /// Insert a conversation row with the default timestamp and return its id.
    pub fn create_conversation(&self) -> Result<i64> {
        let conn = self.connection()?;
        conn.execute("INSERT INTO conversations DEFAULT VALUES", [])
            .map_err(|e| Error::Database(format!("failed to insert conversation: {e}")))?;

        Ok(conn.last_insert_rowid())
    }

    /// All conversations, newest first.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at FROM conversations
                 ORDER BY datetime(created_at) DESC, id DESC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare conversation query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let created_at_str: String = row.get(1)?;
                let created_at = parse_timestamp(&created_at_str).map_err(|e| {
                    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(
                        e.to_string(),
                    )))
                })?;
                Ok(Conversation {
                    id: row.get(0)?,
                    created_at,
                })
            })
            .map_err(|e| Error::Database(format!("failed to query conversations: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to collect conversation rows: {e}")))
    }

    /// Messages of one conversation in insertion order. An id that was never
    /// created yields an empty list, not an error.
    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT sender, message FROM messages
                 WHERE conversation_id = ? ORDER BY id",
            )
            .map_err(|e| Error::Database(format!("failed to prepare message query: {e}")))?;

        let rows = stmt
            .query_map(params![conversation_id], |row| {
                let sender_str: String = row.get(0)?;
                let sender = Sender::from_db(&sender_str).map_err(|e| {
                    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(
                        e.to_string(),
                    )))
                })?;
                Ok(MessageRow {
                    sender,
                    message: row.get(1)?,
                })
            })
            .map_err(|e| Error::Database(format!("failed to query messages: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to collect message rows: {e}")))
    }

    /// Persist one answered question: a "user" row then an "ai" row, in a
    /// single transaction.
    pub fn append_turn(&self, conversation_id: i64, question: &str, answer: &str) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to start transaction: {e}")))?;

        for (sender, message) in [(Sender::User, question), (Sender::Ai, answer)] {
            tx.execute(
                "INSERT INTO messages (conversation_id, sender, message) VALUES (?, ?, ?)",
                params![conversation_id, sender.as_str(), message],
            )
            .map_err(|e| Error::Database(format!("failed to insert message: {e}")))?;
        }

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit message pair: {e}")))
    }
}

/// SQLite's CURRENT_TIMESTAMP writes "%Y-%m-%d %H:%M:%S"; accept RFC3339 too
/// for rows written by other tooling.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }

    Err(Error::Database(format!("invalid timestamp format: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::{ChatStore, Sender};

    #[test]
    fn in_memory_creates_both_tables() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");
        let conn = store.connection().expect("lock should not be poisoned");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master
                 WHERE type='table' AND name IN ('conversations', 'messages')",
                [],
                |row| row.get(0),
            )
            .expect("failed to query sqlite_master");

        assert_eq!(count, 2);
    }

    #[test]
    fn migrations_are_idempotent() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");
        let id = store
            .create_conversation()
            .expect("create should succeed");

        store.run_migrations().expect("second run should succeed");

        let conversations = store.list_conversations().expect("list should succeed");
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id, id);
    }

    #[test]
    fn conversation_ids_strictly_increase() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");

        let mut previous = 0;
        for _ in 0..5 {
            let id = store
                .create_conversation()
                .expect("create should succeed");
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn conversations_list_newest_first() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");
        let first = store.create_conversation().expect("create should succeed");
        let second = store.create_conversation().expect("create should succeed");

        let conversations = store.list_conversations().expect("list should succeed");
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].id, second);
        assert_eq!(conversations[1].id, first);
    }

    #[test]
    fn append_turn_writes_user_then_ai() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");
        let id = store.create_conversation().expect("create should succeed");

        store
            .append_turn(id, "what is this paper about?", "it is about owls")
            .expect("append should succeed");

        let messages = store.list_messages(id).expect("list should succeed");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].message, "what is this paper about?");
        assert_eq!(messages[1].sender, Sender::Ai);
        assert_eq!(messages[1].message, "it is about owls");
    }

    #[test]
    fn history_for_unknown_conversation_is_empty() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");
        let messages = store.list_messages(9999).expect("list should succeed");
        assert!(messages.is_empty());
    }

    #[test]
    fn turns_accumulate_in_insertion_order() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");
        let id = store.create_conversation().expect("create should succeed");

        store.append_turn(id, "q1", "a1").expect("append should succeed");
        store.append_turn(id, "q2", "a2").expect("append should succeed");

        let messages = store.list_messages(id).expect("list should succeed");
        let bodies: Vec<&str> = messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn messages_are_scoped_to_their_conversation() {
        let store = ChatStore::in_memory().expect("failed to create in-memory chat store");
        let a = store.create_conversation().expect("create should succeed");
        let b = store.create_conversation().expect("create should succeed");

        store.append_turn(a, "about a", "answer a").expect("append should succeed");

        assert_eq!(store.list_messages(a).expect("list").len(), 2);
        assert!(store.list_messages(b).expect("list").is_empty());
    }
}

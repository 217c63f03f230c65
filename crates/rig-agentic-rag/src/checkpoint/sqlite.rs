//! SQLite-based checkpointer
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS thread_checkpoints (
//!     thread_id TEXT PRIMARY KEY,
//!     sequence INTEGER NOT NULL,
//!     data BLOB NOT NULL,
//!     updated_at TEXT NOT NULL
//! );
//! ```
//!
//! ```ignore
//! let checkpointer = SqliteCheckpointer::new("./checkpoints.db").await?;
//! let checkpointer = SqliteCheckpointer::new(":memory:").await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio_rusqlite::Connection;

use super::{Checkpoint, Checkpointer};
use crate::error::RagError;

/// Checkpointer backed by a single SQLite table, one row per thread
#[derive(Debug)]
pub struct SqliteCheckpointer {
    conn: Arc<Connection>,
}

impl SqliteCheckpointer {
    /// Open (or create) the database at `path`; `:memory:` for an in-memory database
    pub async fn new(path: impl AsRef<str>) -> Result<Self, RagError> {
        let path = path.as_ref().to_string();

        let conn = Connection::open(&path)
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to open SQLite: {}", e)))?;

        conn.call(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS thread_checkpoints (
                    thread_id TEXT PRIMARY KEY,
                    sequence INTEGER NOT NULL,
                    data BLOB NOT NULL,
                    updated_at TEXT NOT NULL
                );
                "#,
            )?;
            Ok(())
        })
        .await
        .map_err(|e| RagError::checkpoint_error(format!("Failed to create schema: {}", e)))?;

        Ok(Self {
            conn: Arc::new(conn),
        })
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RagError> {
        let data = serde_json::to_vec(checkpoint)
            .map_err(|e| RagError::checkpoint_error(format!("Serialization failed: {}", e)))?;
        let thread_id = checkpoint.thread_id.clone();
        let sequence = checkpoint.sequence as i64;
        let updated_at = checkpoint.timestamp.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO thread_checkpoints (thread_id, sequence, data, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    rusqlite::params![thread_id, sequence, data, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to save checkpoint: {}", e)))
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, RagError> {
        let thread_id = thread_id.to_string();

        let data = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT data FROM thread_checkpoints WHERE thread_id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![thread_id])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get::<_, Vec<u8>>(0)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to load checkpoint: {}", e)))?;

        match data {
            Some(data) => {
                let checkpoint = serde_json::from_slice(&data).map_err(|e| {
                    RagError::checkpoint_error(format!("Deserialization failed: {}", e))
                })?;
                Ok(Some(checkpoint))
            }
            None => Ok(None),
        }
    }

    async fn list_threads(&self) -> Result<Vec<String>, RagError> {
        self.conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT thread_id FROM thread_checkpoints ORDER BY thread_id")?;
                let threads = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(threads)
            })
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to list threads: {}", e)))
    }

    async fn delete(&self, thread_id: &str) -> Result<(), RagError> {
        let thread_id = thread_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM thread_checkpoints WHERE thread_id = ?1",
                    rusqlite::params![thread_id],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to delete checkpoint: {}", e)))
    }
}

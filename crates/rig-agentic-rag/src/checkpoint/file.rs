//! File-based checkpointer
//!
//! One file per thread; thread ids are percent-encoded into file names so
//! arbitrary ids map to safe, reversible names.
//!
//! ```text
//! checkpoints/
//! ├── thread-1.json[.zst]
//! └── user%2F42.json[.zst]
//! ```

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{Checkpoint, Checkpointer};
use crate::error::RagError;

/// Stores each thread's latest checkpoint as a JSON file.
///
/// Writes go to a uniquely named temp file that is then renamed over the
/// target, so concurrent saves for one thread leave exactly one complete file.
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    dir: PathBuf,
    compression: bool,
}

/// Percent-encode a thread id into a file stem.
///
/// `urlencoding` leaves `.` and `~` alone; both are escaped as well so a
/// stem can never be `.`, `..` or a hidden file.
fn encode_thread_id(thread_id: &str) -> String {
    urlencoding::encode(thread_id)
        .replace('.', "%2E")
        .replace('~', "%7E")
}

fn decode_thread_id(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|id| id.into_owned())
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>, compression: bool) -> Self {
        Self {
            dir: dir.into(),
            compression,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn extension(&self) -> &'static str {
        if self.compression {
            ".json.zst"
        } else {
            ".json"
        }
    }

    fn checkpoint_path(&self, thread_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", encode_thread_id(thread_id), self.extension()))
    }

    fn temp_path(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!(
            ".{}.{}.tmp",
            encode_thread_id(thread_id),
            uuid::Uuid::new_v4()
        ))
    }

    fn compress(data: &[u8]) -> Result<Vec<u8>, RagError> {
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3)
            .map_err(|e| RagError::checkpoint_error(format!("Compression init failed: {}", e)))?;
        encoder
            .write_all(data)
            .map_err(|e| RagError::checkpoint_error(format!("Compression write failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| RagError::checkpoint_error(format!("Compression finish failed: {}", e)))
    }

    async fn write_synced(path: &Path, data: &[u8]) -> Result<(), RagError> {
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to create temp file: {}", e)))?;
        file.write_all(data)
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to write data: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to sync file: {}", e)))
    }

    fn decompress(data: &[u8]) -> Result<Vec<u8>, RagError> {
        zstd::stream::decode_all(data)
            .map_err(|e| RagError::checkpoint_error(format!("Decompression failed: {}", e)))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RagError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to create directory: {}", e)))?;

        let json = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| RagError::checkpoint_error(format!("Serialization failed: {}", e)))?;
        let data = if self.compression {
            Self::compress(&json)?
        } else {
            json
        };

        let temp_path = self.temp_path(&checkpoint.thread_id);
        let final_path = self.checkpoint_path(&checkpoint.thread_id);

        let result = match Self::write_synced(&temp_path, &data).await {
            Ok(()) => fs::rename(&temp_path, &final_path)
                .await
                .map_err(|e| RagError::checkpoint_error(format!("Failed to rename file: {}", e))),
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, RagError> {
        let path = self.checkpoint_path(thread_id);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RagError::checkpoint_error(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let json = if self.compression {
            Self::decompress(&data)?
        } else {
            data
        };

        let checkpoint = serde_json::from_slice(&json)
            .map_err(|e| RagError::checkpoint_error(format!("Deserialization failed: {}", e)))?;
        Ok(Some(checkpoint))
    }

    async fn list_threads(&self) -> Result<Vec<String>, RagError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to read directory: {}", e)))?;

        let mut threads = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RagError::checkpoint_error(format!("Failed to read entry: {}", e)))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(thread_id) = name
                .strip_suffix(self.extension())
                .and_then(decode_thread_id)
            {
                threads.push(thread_id);
            }
        }

        threads.sort();
        Ok(threads)
    }

    async fn delete(&self, thread_id: &str) -> Result<(), RagError> {
        match fs::remove_file(self.checkpoint_path(thread_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::checkpoint_error(format!(
                "Failed to delete checkpoint: {}",
                e
            ))),
        }
    }
}

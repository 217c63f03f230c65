//! Plain-text and Markdown loader
//!
//! Files are read as UTF-8, cleaned, and split into overlapping character
//! windows. Chunk ids are `{path}#{index}` where `path` is relative to the
//! directory being loaded (or the bare file name for a single file).

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::DataLoader;
use crate::error::RagError;
use crate::state::DocumentChunk;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

fn blank_run_pattern() -> Option<&'static Regex> {
    static BLANK_RUN: OnceLock<Option<Regex>> = OnceLock::new();
    BLANK_RUN.get_or_init(|| Regex::new(r"\n{3,}").ok()).as_ref()
}

/// Remove extraction noise.
///
/// Runs of three or more single-character lines are dropped (typical of
/// vertical text or broken tables), and three or more consecutive newlines
/// are collapsed to two.
pub fn clean_text(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut single_chars: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.trim().chars().count() == 1 {
            single_chars.push(line);
            continue;
        }
        if single_chars.len() < 3 {
            kept.append(&mut single_chars);
        }
        single_chars.clear();
        kept.push(line);
    }
    if single_chars.len() < 3 {
        kept.append(&mut single_chars);
    }

    let joined = kept.join("\n");
    match blank_run_pattern() {
        Some(re) => re.replace_all(&joined, "\n\n").into_owned(),
        None => joined,
    }
}

/// Split `text` into windows of `size` characters, each starting
/// `size - overlap` characters after the previous one. Blank windows are skipped.
pub fn split_chars(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            windows.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    windows
}

/// Loader for `.txt` / `.md` files and directories of them
#[derive(Debug, Clone)]
pub struct TextFileLoader {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextFileLoader {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextFileLoader {
    /// Create a loader; the overlap must be smaller than the chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::config_error("chunk_size must be greater than 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::config_error(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn load_file(&self, path: &Path, key: &str) -> Result<Vec<DocumentChunk>, RagError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::ingestion_error(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());

        let cleaned = clean_text(&raw);
        let chunks: Vec<DocumentChunk> = split_chars(&cleaned, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                DocumentChunk::new(format!("{}#{}", key, index), text, source.clone())
                    .with_metadata("path", path.display().to_string())
            })
            .collect();

        debug!(file = %path.display(), chunks = chunks.len(), "Split file");
        Ok(chunks)
    }
}

impl DataLoader for TextFileLoader {
    fn load(&self, path: &Path) -> Result<Vec<DocumentChunk>, RagError> {
        if path.is_file() {
            let key = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            return self.load_file(path, &key);
        }

        if !path.is_dir() {
            return Err(RagError::ingestion_error(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }

        let mut chunks = Vec::new();
        let mut files = 0usize;
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let file = entry.path();
            if !entry.file_type().is_file() || !Self::is_supported(file) {
                continue;
            }

            let key = file
                .strip_prefix(path)
                .unwrap_or(file)
                .to_string_lossy()
                .replace('\\', "/");
            chunks.extend(self.load_file(file, &key)?);
            files += 1;
        }

        info!(dir = %path.display(), files, chunks = chunks.len(), "Loaded directory");
        Ok(chunks)
    }
}

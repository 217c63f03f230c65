//! In-memory hybrid store
//!
//! Similarity search is cosine similarity over vectors from an `Embedder`.
//! Keyword search is SQLite FTS5 (BM25 ranking) over a `trigram` tokenizer
//! in an in-memory database, which matches CJK text that has no word
//! separators as well as Latin text. The index can be exported as a list of
//! `StoredChunk`s and rebuilt later without re-embedding.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::store::{Embedder, VectorStore};
use crate::error::RagError;
use crate::state::{DocumentChunk, SearchResult};

/// Shortest term a trigram index can match
const MIN_TERM_CHARS: usize = 3;

/// A chunk together with its embedding, as persisted in a corpus file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// Turn free text into an FTS5 `MATCH` expression, or `None` if nothing
/// in it can match.
///
/// Terms are split on non-alphanumerics and lowercased. Terms shorter than
/// three characters are dropped. Terms with non-ASCII characters are broken
/// into overlapping trigrams so an unsegmented CJK question still matches
/// chunks that share only part of it. Each piece is quoted and the pieces
/// are OR-ed, leaving the ranking to BM25.
pub fn keyword_query(text: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let mut pieces = Vec::new();

    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        let chars: Vec<char> = term.chars().collect();
        if chars.len() < MIN_TERM_CHARS {
            continue;
        }

        if term.is_ascii() {
            if seen.insert(term.clone()) {
                pieces.push(term);
            }
        } else {
            for window in chars.windows(MIN_TERM_CHARS) {
                let trigram: String = window.iter().collect();
                if seen.insert(trigram.clone()) {
                    pieces.push(trigram);
                }
            }
        }
    }

    if pieces.is_empty() {
        return None;
    }

    Some(
        pieces
            .iter()
            .map(|piece| format!("\"{}\"", piece.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

fn keyword_error(err: rusqlite::Error) -> RagError {
    RagError::port_failure("keyword_index", err.to_string())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

fn rank_descending(mut scored: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

/// FTS5 table keyed by the chunk's position in `Index::entries`
struct KeywordIndex {
    conn: Connection,
}

impl KeywordIndex {
    fn open() -> Result<Self, RagError> {
        let conn = Connection::open_in_memory().map_err(keyword_error)?;
        conn.execute_batch(
            "CREATE VIRTUAL TABLE chunk_fts USING fts5(
                text,
                tokenize = 'trigram'
            )",
        )
        .map_err(keyword_error)?;

        Ok(Self { conn })
    }

    /// Replace the rows at the given positions in one transaction
    fn upsert(&mut self, rows: &[(usize, &str)]) -> Result<(), RagError> {
        let tx = self.conn.transaction().map_err(keyword_error)?;
        {
            let mut delete = tx
                .prepare("DELETE FROM chunk_fts WHERE rowid = ?1")
                .map_err(keyword_error)?;
            let mut insert = tx
                .prepare("INSERT INTO chunk_fts (rowid, text) VALUES (?1, ?2)")
                .map_err(keyword_error)?;

            for (position, text) in rows {
                delete
                    .execute(params![*position as i64])
                    .map_err(keyword_error)?;
                insert
                    .execute(params![*position as i64, text])
                    .map_err(keyword_error)?;
            }
        }
        tx.commit().map_err(keyword_error)
    }

    /// Positions and BM25 scores (higher is better) of the best `k` matches
    fn search(&self, expression: &str, k: usize) -> Result<Vec<(usize, f64)>, RagError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT rowid, bm25(chunk_fts) FROM chunk_fts
                 WHERE chunk_fts MATCH ?1
                 ORDER BY bm25(chunk_fts), rowid
                 LIMIT ?2",
            )
            .map_err(keyword_error)?;

        let rows = stmt
            .query_map(params![expression, k as i64], |row| {
                Ok((row.get::<_, i64>(0)? as usize, -row.get::<_, f64>(1)?))
            })
            .map_err(keyword_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(keyword_error)
    }
}

struct Index {
    entries: Vec<StoredChunk>,
    positions: HashMap<String, usize>,
    keywords: KeywordIndex,
}

impl Index {
    fn open() -> Result<Self, RagError> {
        Ok(Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            keywords: KeywordIndex::open()?,
        })
    }

    /// Insert or replace chunks by id; a replaced chunk keeps its position
    fn upsert(&mut self, chunks: Vec<StoredChunk>) -> Result<(), RagError> {
        let mut touched = Vec::with_capacity(chunks.len());
        for stored in chunks {
            let position = match self.positions.get(&stored.chunk.id).copied() {
                Some(position) => {
                    self.entries[position] = stored;
                    position
                }
                None => {
                    self.positions
                        .insert(stored.chunk.id.clone(), self.entries.len());
                    self.entries.push(stored);
                    self.entries.len() - 1
                }
            };
            touched.push(position);
        }

        touched.sort_unstable();
        touched.dedup();
        let rows: Vec<(usize, &str)> = touched
            .iter()
            .map(|&position| (position, self.entries[position].chunk.text.as_str()))
            .collect();
        self.keywords.upsert(&rows)
    }
}

/// Hybrid vector/keyword store held entirely in memory
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    index: Mutex<Index>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Result<Self, RagError> {
        Ok(Self {
            embedder,
            index: Mutex::new(Index::open()?),
        })
    }

    /// Rebuild a store from previously exported chunks without re-embedding
    pub fn from_snapshot(
        embedder: Arc<dyn Embedder>,
        chunks: Vec<StoredChunk>,
    ) -> Result<Self, RagError> {
        let mut index = Index::open()?;
        index.upsert(chunks)?;

        Ok(Self {
            embedder,
            index: Mutex::new(index),
        })
    }

    /// Export every chunk with its embedding, in insertion order
    pub async fn snapshot(&self) -> Vec<StoredChunk> {
        self.index.lock().await.entries.clone()
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            RagError::port_failure(self.embedder.name(), "embedder returned no vector")
        })
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, RagError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::port_failure(
                self.embedder.name(),
                format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ),
            ));
        }

        let count = chunks.len();
        let stored = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk { chunk, embedding })
            .collect();

        let mut index = self.index.lock().await;
        index.upsert(stored)?;
        debug!(added = count, total = index.entries.len(), "Indexed chunks");

        Ok(count)
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>, RagError> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vector = self.embed_one(query).await?;
        let index = self.index.lock().await;
        let scored = index
            .entries
            .iter()
            .map(|entry| {
                SearchResult::new(
                    entry.chunk.clone(),
                    cosine_similarity(&query_vector, &entry.embedding),
                )
            })
            .collect();

        Ok(rank_descending(scored, k))
    }

    async fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, RagError> {
        let Some(expression) = keyword_query(query) else {
            return Ok(Vec::new());
        };

        let index = self.index.lock().await;
        if k == 0 || index.entries.is_empty() {
            return Ok(Vec::new());
        }

        let hits = index.keywords.search(&expression, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(position, score)| {
                let entry = index.entries.get(position)?;
                Some(SearchResult::new(entry.chunk.clone(), score))
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.index.lock().await.entries.len()
    }
}

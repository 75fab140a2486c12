use std::path::Path;
use std::sync::Arc;

use paperchat_common::{Error, Result};
use tracing::{info, instrument};

use crate::document::extract_text;
use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, split_text};

/// Builds a searchable vector index from an uploaded document.
pub struct DocumentIndexer {
    embeddings: Arc<dyn EmbeddingProvider>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentIndexer {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embeddings,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Load, split, and embed the document at `path` into a fresh index.
    ///
    /// On failure the caller's existing index is untouched: a new index is
    /// only ever returned from a fully successful run.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn index_document(&self, path: &Path) -> Result<VectorIndex> {
        let text = extract_text(path)?;
        let chunks = split_text(&text, self.chunk_size, self.chunk_overlap);
        if chunks.is_empty() {
            return Err(Error::Indexing("document produced no text chunks".into()));
        }

        let embeddings = self.embeddings.embed_documents(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Indexing(format!(
                "embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        info!(
            "indexed {} chunks with {} embeddings ({})",
            chunks.len(),
            self.embeddings.provider_id(),
            self.embeddings.model()
        );

        Ok(VectorIndex::new(chunks, embeddings))
    }
}

/// In-memory searchable collection of (chunk, embedding) pairs.
///
/// One index represents one uploaded document; a new upload builds a fresh
/// index and the caller swaps it in wholesale.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

struct IndexEntry {
    content: String,
    embedding: Vec<f32>,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk<'a> {
    pub content: &'a str,
    pub score: f32,
}

impl VectorIndex {
    /// Build an index from parallel chunk and embedding lists.
    pub fn new(chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Self {
        debug_assert_eq!(chunks.len(), embeddings.len());
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| IndexEntry { content, embedding })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k entries by cosine similarity to `query_embedding`, best first.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                content: entry.content.as_str(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

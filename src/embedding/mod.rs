//! Retrieval over text chunks.
//!
//! Documents (file summaries, source text) are split into overlapping
//! chunks, embedded by a pluggable provider (TF-IDF today), and searched
//! by cosine similarity. Callers see only the `Retriever` trait.

pub mod chunks;
pub mod tfidf;

pub use chunks::{split_text, Chunk, ChunkIndex, Document};

/// A single embedding vector.
pub type Embedding = Vec<f32>;

/// Trait for embedding text into vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a text string into a vector.
    fn embed(&self, text: &str) -> Embedding;
    /// Dimensionality of the embedding space.
    fn dimensions(&self) -> usize;
}

/// Top-K context lookup for prompt assembly.
pub trait Retriever: Send + Sync {
    /// The `k` passages most relevant to `query`, best first.
    fn retrieve(&self, query: &str, k: usize) -> Vec<String>;
}

/// Position and score of one search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub index: usize,
    pub score: f32,
}

/// Cosine similarity between two vectors.
///
/// For unit vectors, this is just the dot product. The full formula also
/// handles non-normalized vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Pre-computed embeddings in insertion order.
#[derive(Debug, Default)]
pub struct EmbeddingIndex {
    entries: Vec<Embedding>,
}

impl EmbeddingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an embedding; returns its position.
    pub fn push(&mut self, embedding: Embedding) -> usize {
        self.entries.push(embedding);
        self.entries.len() - 1
    }

    /// Top K entries by descending score. Ties keep insertion order.
    pub fn search_top_k(&self, query: &[f32], k: usize) -> Vec<Scored> {
        let mut results: Vec<Scored> = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, emb)| Scored {
                index,
                score: cosine_similarity(query, emb),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

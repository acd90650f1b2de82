//! Text chunking and the chunk index behind retrieval-augmented prompts.

use std::collections::VecDeque;

use tracing::debug;

use super::tfidf::TfIdfProvider;
use super::{EmbeddingIndex, EmbeddingProvider, Retriever};

/// A named piece of text to index, e.g. one file summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: String,
    pub text: String,
}

/// Split on newlines and merge lines into chunks of at most `size` bytes.
/// Consecutive chunks share trailing lines totalling at most `overlap`
/// bytes. A single line longer than `size` becomes a chunk of its own.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for line in text.split('\n').map(str::trim_end).filter(|l| !l.trim().is_empty()) {
        let sep = usize::from(!current.is_empty());
        if total + sep + line.len() > size && !current.is_empty() {
            chunks.push(join(&current));
            while total > overlap || (total > 0 && total + 1 + line.len() > size) {
                let Some(first) = current.pop_front() else { break };
                total -= first.len() + usize::from(!current.is_empty());
            }
        }
        total += line.len() + usize::from(!current.is_empty());
        current.push_back(line);
    }
    if !current.is_empty() {
        chunks.push(join(&current));
    }
    chunks
}

fn join(lines: &VecDeque<&str>) -> String {
    lines.iter().copied().collect::<Vec<_>>().join("\n")
}

/// Chunks of a document set, TF-IDF embedded for cosine search.
pub struct ChunkIndex {
    chunks: Vec<Chunk>,
    provider: TfIdfProvider,
    index: EmbeddingIndex,
}

impl ChunkIndex {
    pub fn build(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                split_text(&doc.text, chunk_size, chunk_overlap)
                    .into_iter()
                    .map(|text| Chunk {
                        source: doc.source.clone(),
                        text,
                    })
            })
            .collect();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let provider = TfIdfProvider::from_corpus(&texts);
        let mut index = EmbeddingIndex::new();
        for chunk in &chunks {
            index.push(provider.embed(&chunk.text));
        }
        debug!(documents = documents.len(), chunks = chunks.len(), "built chunk index");

        Self {
            chunks,
            provider,
            index,
        }
    }

    /// The `k` best chunks with their scores.
    pub fn search(&self, query: &str, k: usize) -> Vec<(&Chunk, f32)> {
        let query = self.provider.embed(query);
        self.index
            .search_top_k(&query, k)
            .into_iter()
            .map(|hit| (&self.chunks[hit.index], hit.score))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl Retriever for ChunkIndex {
    fn retrieve(&self, query: &str, k: usize) -> Vec<String> {
        self.search(query, k)
            .into_iter()
            .map(|(chunk, _)| format!("Source: {}\n{}", chunk.source, chunk.text))
            .collect()
    }
}

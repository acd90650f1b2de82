//! TF-IDF embedding provider.
//!
//! Vocabulary and IDF weights come from the chunk corpus being indexed.
//! Identifiers are tokenized whole and by their camelCase parts, so
//! `UserService` matches a query for "user service". Vectors are
//! normalized to unit length.

use std::collections::{HashMap, HashSet};

use super::{Embedding, EmbeddingProvider};

/// Common English words and Java keywords that carry no signal.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "in", "on", "of", "to", "and", "or", "for", "with", "this",
    "that", "be", "are", "was", "were", "been", "have", "has", "had", "do", "does", "will",
    "would", "could", "should", "can", "not", "no", "but", "if", "at", "by", "from", "as",
    "into", "so", "its", "we", "our", "they", "their", "public", "private", "protected",
    "static", "final", "void", "return", "new", "class", "import", "package",
];

#[derive(Debug, Clone)]
pub struct TfIdfProvider {
    /// term → dimension index
    vocabulary: HashMap<String, usize>,
    /// IDF weight per dimension
    idf: Vec<f32>,
}

impl TfIdfProvider {
    /// Build vocabulary and IDF weights from a corpus.
    pub fn from_corpus<S: AsRef<str>>(documents: &[S]) -> Self {
        let n = documents.len() as f32;
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for doc in documents {
            let unique: HashSet<String> = tokenize(doc.as_ref()).into_iter().collect();
            for term in unique {
                let next = vocabulary.len();
                let idx = *vocabulary.entry(term).or_insert(next);
                if idx == doc_freq.len() {
                    doc_freq.push(0);
                }
                doc_freq[idx] += 1;
            }
        }

        // Smoothed IDF: ln(N / df) + 1
        let idf = doc_freq
            .iter()
            .map(|&df| (n / (df as f32).max(1.0)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }
}

impl EmbeddingProvider for TfIdfProvider {
    fn embed(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.idf.len()];
        for token in tokenize(text) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                vector[idx] += self.idf[idx];
            }
        }
        normalize(&mut vector);
        vector
    }

    fn dimensions(&self) -> usize {
        self.idf.len()
    }
}

/// Lowercased words, plus the camelCase parts of mixed-case identifiers.
/// Single characters and stop words are dropped.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let parts = camel_parts(word);
        if parts.len() > 1 {
            tokens.extend(parts.into_iter().map(|p| p.to_lowercase()));
        }
        tokens.push(word.to_lowercase());
    }
    tokens.retain(|w| w.chars().count() > 1 && !STOP_WORDS.contains(&w.as_str()));
    tokens
}

/// `getUserById` → `get`, `User`, `By`, `Id`.
fn camel_parts(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev_lower = false;
    for (i, c) in word.char_indices() {
        if c.is_uppercase() && prev_lower {
            parts.push(&word[start..i]);
            start = i;
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
    }
    if start < word.len() {
        parts.push(&word[start..]);
    }
    parts
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_camel_case_identifiers() {
        assert_eq!(camel_parts("getUserById"), vec!["get", "User", "By", "Id"]);
        assert_eq!(camel_parts("plain"), vec!["plain"]);
        assert_eq!(camel_parts("URL"), vec!["URL"]);
    }

    #[test]
    fn tokenizer_keeps_identifier_and_parts() {
        let tokens = tokenize("public UserService.findUser(x)");
        assert_eq!(tokens, vec!["user", "service", "userservice", "find", "user", "finduser"]);
    }

    #[test]
    fn vocabulary_covers_corpus() {
        let provider = TfIdfProvider::from_corpus(&["read files", "write files"]);
        assert_eq!(provider.dimensions(), 3);
        let files = provider.vocabulary["files"];
        let read = provider.vocabulary["read"];
        assert!(provider.idf[read] > provider.idf[files]);
    }

    #[test]
    fn known_terms_embed_to_unit_vector() {
        let provider = TfIdfProvider::from_corpus(&["read files from the filesystem"]);
        let embedding = provider.embed("read files");
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn unknown_terms_embed_to_zero() {
        let provider = TfIdfProvider::from_corpus(&["read files from the filesystem"]);
        let embedding = provider.embed("xyzzy quantum blockchain");
        assert_eq!(embedding.len(), provider.dimensions());
        assert!(embedding.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn empty_corpus_has_no_dimensions() {
        let provider = TfIdfProvider::from_corpus::<&str>(&[]);
        assert_eq!(provider.dimensions(), 0);
        assert!(provider.embed("anything").is_empty());
    }
}

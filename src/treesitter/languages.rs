//! Language grammars for tree-sitter.

use tree_sitter::Language;

/// Languages the patch engine can edit structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Java,
}

impl Lang {
    /// Detect language from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Detect language from a path's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter Language grammar.
    pub fn grammar(&self) -> Language {
        match self {
            Self::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// Language name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Java => "java",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    #[test]
    fn detects_java() {
        assert_eq!(Lang::from_extension("java"), Some(Lang::Java));
        assert_eq!(Lang::from_path(Path::new("src/A.java")), Some(Lang::Java));
        assert_eq!(Lang::from_path(Path::new("build.gradle")), None);
        assert_eq!(Lang::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn grammar_loads() {
        let mut parser = tree_sitter::Parser::new();
        assert!(parser.set_language(&Lang::Java.grammar()).is_ok());
        assert_eq!(Lang::Java.name(), "java");
    }
}

//! Sources of answers to the model's clarifying questions.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("failed to read answer: {0}")]
    Io(#[from] std::io::Error),

    #[error("answer source closed")]
    Closed,
}

/// Whoever answers the model when it asks something.
#[async_trait]
pub trait AnswerSource: Send {
    async fn answer(&mut self, question: &str) -> Result<String, AnswerError>;
}

/// Human operator on the terminal: print the question, read one line.
pub struct StdinAnswers {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinAnswers {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinAnswers {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerSource for StdinAnswers {
    async fn answer(&mut self, question: &str) -> Result<String, AnswerError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("\nModel asks:\n{question}\n\nYour answer: ").as_bytes())
            .await?;
        stdout.flush().await?;
        self.lines.next_line().await?.ok_or(AnswerError::Closed)
    }
}

/// Automated stub: gives the same answer to every question.
#[derive(Debug, Clone)]
pub struct FixedAnswer {
    text: String,
}

impl FixedAnswer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl AnswerSource for FixedAnswer {
    async fn answer(&mut self, _question: &str) -> Result<String, AnswerError> {
        Ok(self.text.clone())
    }
}

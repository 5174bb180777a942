//! Document codec seam
//!
//! The batch engine never touches text formats directly; it builds its
//! simulation copy and its dry-run preview through a [`DocumentCodec`].

use thiserror::Error;

use super::list::TaskList;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unsupported content on line {line}: {what}")]
    Unsupported { line: usize, what: String },

    #[error("invalid front matter: {0}")]
    FrontMatter(String),

    #[error("document too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
}

impl CodecError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        CodecError::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// Converts a task list to and from its persisted text form
///
/// Implementations must be lossless for everything a [`TaskList`] carries
/// except the modification time.
pub trait DocumentCodec {
    fn encode(&self, list: &TaskList) -> Result<String, CodecError>;

    fn decode(&self, text: &str) -> Result<TaskList, CodecError>;
}

use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while building or running the chunking engine.
///
/// Document content never produces an error at the segmenter surface: malformed
/// documents degrade to an empty chunk list or a tagged passthrough chunk. These
/// variants surface from construction and from the typed parsing helpers.
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Failed to parse the source code
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Language has no structural parser
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Malformed structured input (web records, notebook exports)
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tokenizer could not be loaded
    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    /// A masking rule failed to compile
    #[error("Invalid mask pattern for {tag}: {message}")]
    InvalidPattern { tag: String, message: String },

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl ChunkerError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a tokenizer error
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::TokenizerError(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}

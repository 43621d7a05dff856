use crate::error::{ChunkerError, Result};
use std::path::Path;

/// Source language of a code document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "py" | "pyw" | "pyi" => Language::Python,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Unknown => "unknown",
        }
    }

    /// Check if this language has a structural parser
    pub fn supports_ast(self) -> bool {
        matches!(self, Language::Python)
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::Unknown => Err(ChunkerError::unsupported_language(self.as_str())),
        }
    }

    /// Line comment prefix, used to recognise license headers
    pub fn line_comment(self) -> Option<&'static str> {
        match self {
            Language::Python => Some("#"),
            Language::Unknown => None,
        }
    }
}

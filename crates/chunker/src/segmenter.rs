use crate::language::Language;
use crate::types::Chunk;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One document format's chunking strategy.
///
/// Implementations never fail on document content: malformed input yields an
/// empty list or a single tagged passthrough chunk.
pub trait Segmenter {
    /// Segment `raw` document text. `source` identifies the document and lands
    /// in each chunk's `source` metadata unless the document names its own.
    fn segment(&self, raw: &str, source: &str) -> Vec<Chunk>;
}

/// Input document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Python source code
    Source,
    /// Web or API documentation records (JSON)
    Web,
    /// Notebook exports (JSON)
    Notebook,
    /// Markdown converted from PDF
    Pdf,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Source,
        DocumentKind::Web,
        DocumentKind::Notebook,
        DocumentKind::Pdf,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Source => "source",
            DocumentKind::Web => "web",
            DocumentKind::Notebook => "notebook",
            DocumentKind::Pdf => "pdf",
        }
    }

    /// File extension documents of this kind are stored with
    pub const fn extension(self) -> &'static str {
        match self {
            DocumentKind::Source => "py",
            DocumentKind::Web | DocumentKind::Notebook => "json",
            DocumentKind::Pdf => "md",
        }
    }

    /// Guess the kind from a path. JSON is ambiguous and maps to `Web`
    /// unless the file name mentions a notebook.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        if Language::from_path(path).supports_ast() {
            return Some(DocumentKind::Source);
        }

        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(DocumentKind::Pdf),
            "ipynb" => Some(DocumentKind::Notebook),
            "json" => {
                let stem = path.file_stem()?.to_str()?.to_lowercase();
                if stem.contains("notebook") {
                    Some(DocumentKind::Notebook)
                } else {
                    Some(DocumentKind::Web)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "source" | "python" | "code" => Ok(DocumentKind::Source),
            "web" | "api" | "markdown" => Ok(DocumentKind::Web),
            "notebook" | "notebooks" => Ok(DocumentKind::Notebook),
            "pdf" => Ok(DocumentKind::Pdf),
            other => Err(format!("unknown document kind '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(DocumentKind::from_path("pkg/mod.py"), Some(DocumentKind::Source));
        assert_eq!(DocumentKind::from_path("paper.md"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path("docs/page.json"), Some(DocumentKind::Web));
        assert_eq!(
            DocumentKind::from_path("notebook_intro.json"),
            Some(DocumentKind::Notebook)
        );
        assert_eq!(DocumentKind::from_path("image.png"), None);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("API".parse::<DocumentKind>(), Ok(DocumentKind::Web));
        assert_eq!("python".parse::<DocumentKind>(), Ok(DocumentKind::Source));
        assert!("slides".parse::<DocumentKind>().is_err());
        assert_eq!(DocumentKind::Notebook.to_string(), "notebook");
    }
}

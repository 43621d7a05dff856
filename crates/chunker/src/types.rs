use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata keys shared by every segmenter
pub mod keys {
    pub const SOURCE: &str = "source";
    pub const TOKEN_COUNT: &str = "token_count";
    pub const SPLIT_GROUP_ID: &str = "split_group_id";
    pub const CONTEXT_PATH: &str = "context_path";
    pub const HAS_CODE: &str = "has_code";
    pub const HAS_LATEX: &str = "has_latex";
    pub const TYPE: &str = "type";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const STRATEGY: &str = "strategy";
    pub const CELL_RANGE: &str = "cell_range";
    pub const CELL_INDEX: &str = "cell_index";
    pub const CLASS_NAME: &str = "class_name";
    pub const FUNCTION_NAME: &str = "function_name";
    pub const PARENT_CLASS: &str = "parent_class";
    pub const DEPENDENCIES: &str = "dependencies";
    pub const LANGUAGE: &str = "language";
    pub const ERROR: &str = "error";
    pub const SPLIT_METHOD: &str = "split_method";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const CHUNK_INDEX_SUB: &str = "chunk_index_sub";
    pub const ORIGINAL_BLOCK_TYPE: &str = "original_block_type";
    pub const TOPIC: &str = "topic";
    pub const RELATED_SOURCE_FILE: &str = "related_source_file";
    pub const VERSION: &str = "version";
}

/// Flat metadata mapping attached to every chunk.
///
/// Keys are kept sorted so serialized records are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder: insert a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Copy every entry of `other` over this mapping
    pub fn extend(&mut self, other: &Metadata) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop null, empty-string and empty-list values. Idempotent.
    #[must_use]
    pub fn cleaned(mut self) -> Self {
        self.0.retain(|_, value| !is_blank(value));
        self
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// A bounded text fragment ready for embedding, with provenance metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub content: String,

    /// Flattened provenance metadata (never holds null or empty values)
    pub metadata: Metadata,

    /// Process-wide unique identifier
    pub id: String,
}

impl Chunk {
    /// Create a chunk with a fresh id and cleaned metadata
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata: metadata.cleaned(),
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Token count recorded when the chunk passed a sizing decision
    #[must_use]
    pub fn token_count(&self) -> Option<usize> {
        self.metadata
            .get_u64(keys::TOKEN_COUNT)
            .map(|count| count as usize)
    }

    #[must_use]
    pub fn split_group_id(&self) -> Option<&str> {
        self.metadata.get_str(keys::SPLIT_GROUP_ID)
    }

    #[must_use]
    pub fn context_path(&self) -> Option<&str> {
        self.metadata.get_str(keys::CONTEXT_PATH)
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Fresh split-group identifier, e.g. `forced_split_1a2b3c4d`
#[must_use]
pub fn new_split_group_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &suffix[..8])
}

/// Structural role of a source-code chunk (`type` metadata key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Class header with docstring and initializer
    ClassDefinition,
    /// Standalone function or method
    FunctionDefinition,
    /// Docstring emitted apart from its oversized declaration
    DocstringOnly,
    /// Top-level statements outside any declaration
    ModuleLevel,
}

impl ChunkType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClassDefinition => "class_definition",
            Self::FunctionDefinition => "function_definition",
            Self::DocstringOnly => "docstring_only",
            Self::ModuleLevel => "module_level",
        }
    }
}

/// How a notebook chunk was produced (`strategy` metadata key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CellStrategy {
    /// Several consecutive small cells
    Buffer,
    /// One oversized text cell split on headings
    MarkdownHeader,
    /// One oversized code cell split aggressively
    LargeCodeSplit,
}

impl CellStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::MarkdownHeader => "markdown_header",
            Self::LargeCodeSplit => "large_code_split",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_cleaned_drops_blank_values() {
        let mut meta = Metadata::new()
            .with("source", "a.py")
            .with("topic", "")
            .with("dependencies", Vec::<String>::new())
            .with("has_code", false)
            .with("token_count", 0);
        meta.insert("version", None::<String>);

        let cleaned = meta.cleaned();
        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned.get_str("source"), Some("a.py"));
        assert_eq!(cleaned.get_bool("has_code"), Some(false));
        assert_eq!(cleaned.get_u64("token_count"), Some(0));
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let meta = Metadata::new()
            .with("source", "doc")
            .with("context_path", "A > B")
            .with("empty", "");
        let once = meta.cleaned();
        let twice = once.clone().cleaned();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_chunk_ids_are_unique() {
        let a = Chunk::new("x", Metadata::new());
        let b = Chunk::new("x", Metadata::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_chunk_json_line_shape() {
        let chunk = Chunk::new(
            "body",
            Metadata::new().with("source", "s").with("token_count", 1),
        );
        let value: Value = serde_json::from_str(&chunk.to_json_line().unwrap()).unwrap();
        assert_eq!(value["content"], json!("body"));
        assert_eq!(value["metadata"], json!({"source": "s", "token_count": 1}));
        assert_eq!(value["id"], json!(chunk.id));
        assert_eq!(chunk.token_count(), Some(1));
    }

    #[test]
    fn test_split_group_id_shape() {
        let id = new_split_group_id("buffer");
        assert!(id.starts_with("buffer_"));
        assert_eq!(id.len(), "buffer_".len() + 8);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ChunkType::DocstringOnly.as_str(), "docstring_only");
        assert_eq!(CellStrategy::Buffer.as_str(), "buffer");
    }
}

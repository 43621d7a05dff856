use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::markdown::MarkdownSegmenter;
use crate::notebook::NotebookSegmenter;
use crate::pdf::PdfSegmenter;
use crate::segmenter::{DocumentKind, Segmenter};
use crate::source::SourceSegmenter;
use crate::tokens::TokenCounter;
use crate::types::{keys, Chunk};
use std::collections::BTreeMap;
use std::path::Path;

/// Main entry point: one segmenter per document kind sharing a token counter
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
    counter: TokenCounter,
    source: SourceSegmenter,
    web: MarkdownSegmenter,
    notebook: NotebookSegmenter,
    pdf: PdfSegmenter,
}

impl Chunker {
    /// Create a chunker, validating the configuration and loading the tokenizer
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        let counter = TokenCounter::new(&config)?;

        Ok(Self {
            source: SourceSegmenter::new(&counter, &config),
            web: MarkdownSegmenter::new(&counter, &config)?,
            notebook: NotebookSegmenter::new(&counter, &config)?,
            pdf: PdfSegmenter::new(&counter, &config)?,
            counter,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    #[must_use]
    pub const fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Segmenter responsible for `kind`
    #[must_use]
    pub fn segmenter(&self, kind: DocumentKind) -> &dyn Segmenter {
        match kind {
            DocumentKind::Source => &self.source,
            DocumentKind::Web => &self.web,
            DocumentKind::Notebook => &self.notebook,
            DocumentKind::Pdf => &self.pdf,
        }
    }

    /// Segment one document. Never fails on content; see [`Segmenter`].
    pub fn segment(&self, kind: DocumentKind, raw: &str, source: &str) -> Vec<Chunk> {
        let chunks = self.segmenter(kind).segment(raw, source);
        log::debug!("{source}: {} {kind} chunks", chunks.len());
        chunks
    }

    /// Read and segment a file, using its file name as the source identifier
    pub fn segment_file(&self, kind: DocumentKind, path: impl AsRef<Path>) -> Result<Vec<Chunk>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown");
        Ok(self.segment(kind, &raw, source))
    }

    /// Get statistics about chunks
    #[must_use]
    pub fn get_stats(chunks: &[Chunk]) -> ChunkingStats {
        let tokens: Vec<usize> = chunks.iter().filter_map(Chunk::token_count).collect();
        let total_tokens = tokens.iter().sum();

        let mut by_type = BTreeMap::new();
        for chunk in chunks {
            let label = chunk
                .metadata
                .get_str(keys::TYPE)
                .or_else(|| chunk.metadata.get_str(keys::STRATEGY))
                .unwrap_or("text");
            *by_type.entry(label.to_string()).or_insert(0) += 1;
        }

        ChunkingStats {
            total_chunks: chunks.len(),
            total_tokens,
            avg_tokens_per_chunk: if tokens.is_empty() {
                0
            } else {
                total_tokens / tokens.len()
            },
            min_tokens: tokens.iter().copied().min().unwrap_or(0),
            max_tokens: tokens.iter().copied().max().unwrap_or(0),
            split_chunks: chunks.iter().filter(|c| c.split_group_id().is_some()).count(),
            by_type,
        }
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    /// Chunks that belong to a split group
    pub split_chunks: usize,
    /// Chunk counts keyed by `type`, else `strategy`, else "text"
    pub by_type: BTreeMap<String, usize>,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Tokens: {} | Avg: {} | Range: {}-{} | Split: {}",
            self.total_chunks,
            self.total_tokens,
            self.avg_tokens_per_chunk,
            self.min_tokens,
            self.max_tokens,
            self.split_chunks
        )
    }
}

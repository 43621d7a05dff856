//! # ragchunk chunker
//!
//! Token-bounded semantic chunking of heterogeneous documents for retrieval.
//!
//! ## Philosophy
//!
//! The chunker cuts documents along their own structure and never past a token
//! budget:
//! - Every chunk fits the safe limit (target limit minus a safety margin)
//! - Code blocks and formulas are never cut unless alone they exceed the limit
//! - Fragments of one oversized unit share a `split_group_id`
//! - Malformed documents degrade to an empty list or one tagged chunk
//!
//! ## Architecture
//!
//! ```text
//! Document (source / web JSON / notebook JSON / PDF markdown)
//!     │
//!     ├──> Segmenter (per kind)
//!     │    ├─> Python: tree-sitter → classes, methods, functions, statements
//!     │    ├─> Web/PDF: clean → mask spans → heading sections
//!     │    └─> Notebook: cell buffer → large cells split by type
//!     │
//!     ├──> Span Protection
//!     │    └─> code fences, outputs, LaTeX → opaque placeholders
//!     │
//!     └──> Buffered Reassembly
//!          ├─> Pack text and restored spans under the safe limit
//!          ├─> Forced recursive split of oversized pieces
//!          └─> Emit Chunk[] with metadata and token counts
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use ragchunk_chunker::{Chunker, ChunkerConfig, DocumentKind};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//!
//! let doc = "# Setup\nInstall the package.\n# Usage\nRun it.";
//! for chunk in chunker.segment(DocumentKind::Pdf, doc, "guide.md") {
//!     println!("{:?}: {}", chunk.context_path(), chunk.content);
//! }
//! ```

mod ast_analyzer;
mod chunker;
mod config;
mod error;
mod headings;
mod language;
mod markdown;
mod masking;
mod notebook;
mod pdf;
mod reassembly;
mod sections;
mod segmenter;
mod source;
mod splitter;
mod tokens;
mod types;

pub use ast_analyzer::{AstAnalyzer, ParsedModule, SourceUnit, UnitKind};
pub use chunker::{Chunker, ChunkingStats};
pub use config::{safe_limit, ChunkerConfig};
pub use error::{ChunkerError, Result};
pub use headings::{parse_heading, split_sections, Heading, Section};
pub use language::Language;
pub use markdown::{
    convert_html_headings, MarkdownSegmenter, RecordMetadata, WebRecord, STRUCTURED_TEXT_RULES,
};
pub use masking::{
    mask, segments, MaskMap, MaskRule, MaskedText, Segment, CODE_FENCE, CODE_WITH_OUTPUT,
    LATEX_BLOCK, LATEX_INLINE, LATEX_MARKERS,
};
pub use notebook::{Cell, CellKind, Notebook, NotebookMetadata, NotebookSegmenter};
pub use pdf::{clean_artifacts, PdfSegmenter};
pub use reassembly::Reassembler;
pub use sections::SectionChunker;
pub use segmenter::{DocumentKind, Segmenter};
pub use source::SourceSegmenter;
pub use splitter::{RecursiveSplitter, SECTION_SEPARATORS, SOURCE_SEPARATORS, TEXT_SEPARATORS};
pub use tokens::{TokenCounter, TokenEncoding};
pub use types::{keys, new_split_group_id, CellStrategy, Chunk, ChunkType, Metadata};

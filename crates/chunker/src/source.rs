//! Code-structure segmentation.
//!
//! Classes become one primary chunk (signature, docstring, class attributes and
//! initializer) followed by one chunk per method; functions become one chunk
//! each; remaining top-level statements are grouped as module-level content.
//! Oversized declarations first shed their docstring into a separate chunk,
//! then fall back to a recursive split biased toward `class`/`def` boundaries.

use crate::ast_analyzer::{strip_license_header, AstAnalyzer, ParsedModule, SourceUnit, UnitKind};
use crate::config::ChunkerConfig;
use crate::language::Language;
use crate::segmenter::Segmenter;
use crate::splitter::RecursiveSplitter;
use crate::tokens::TokenCounter;
use crate::types::{keys, new_split_group_id, Chunk, ChunkType, Metadata};

const CONTENT_TYPE: &str = "code_mixed";
const SYNTAX_ERROR: &str = "syntax_error";
const FALLBACK_METHOD: &str = "recursive_fallback";

#[derive(Debug, Clone)]
pub struct SourceSegmenter {
    counter: TokenCounter,
    fallback: RecursiveSplitter,
    language: Language,
}

impl SourceSegmenter {
    pub fn new(counter: &TokenCounter, config: &ChunkerConfig) -> Self {
        Self {
            counter: counter.clone(),
            fallback: RecursiveSplitter::source(counter, config.source_overlap),
            language: Language::Python,
        }
    }

    fn parse(&self, source: &str) -> crate::Result<ParsedModule> {
        AstAnalyzer::new(self.language)?.analyze(source)
    }

    /// Unparseable source is passed through whole, never split
    fn passthrough(&self, source: &str, filename: &str) -> Chunk {
        let metadata = Metadata::new()
            .with(keys::SOURCE, filename)
            .with(keys::LANGUAGE, self.language.as_str())
            .with(keys::CONTENT_TYPE, CONTENT_TYPE)
            .with(keys::ERROR, SYNTAX_ERROR)
            .with(keys::TOKEN_COUNT, self.counter.count(source));
        Chunk::new(source, metadata)
    }

    fn class_chunks(&self, unit: &SourceUnit, base: &Metadata, out: &mut Vec<Chunk>) {
        let name = unit.name.as_deref().unwrap_or_default();
        let class_meta = base
            .clone()
            .with(keys::CLASS_NAME, name)
            .with(keys::TYPE, ChunkType::ClassDefinition.as_str());

        self.declaration_chunks(unit, &class_meta, out);

        let method_meta = class_meta.with(keys::PARENT_CLASS, name);
        for method in &unit.children {
            self.function_chunks(method, &method_meta, out);
        }
    }

    fn function_chunks(&self, unit: &SourceUnit, base: &Metadata, out: &mut Vec<Chunk>) {
        let function_meta = base
            .clone()
            .with(keys::FUNCTION_NAME, unit.name.as_deref().unwrap_or_default())
            .with(keys::TYPE, ChunkType::FunctionDefinition.as_str());

        self.declaration_chunks(unit, &function_meta, out);
    }

    /// Whole declaration when it fits; docstring and code apart when it does
    /// not and there is a docstring to shed
    fn declaration_chunks(&self, unit: &SourceUnit, meta: &Metadata, out: &mut Vec<Chunk>) {
        match &unit.docstring {
            Some(doc) if !self.counter.fits(&unit.text) => {
                log::debug!(
                    "Declaration '{}' exceeds limit, emitting docstring separately",
                    unit.name.as_deref().unwrap_or_default()
                );
                let doc_meta = meta
                    .clone()
                    .with(keys::TYPE, ChunkType::DocstringOnly.as_str());
                self.emit(doc, &doc_meta, out);
                self.emit(&unit.code_text, meta, out);
            }
            _ => self.emit(&unit.text, meta, out),
        }
    }

    fn emit(&self, content: &str, meta: &Metadata, out: &mut Vec<Chunk>) {
        if content.trim().is_empty() {
            return;
        }

        let tokens = self.counter.count(content);
        if tokens <= self.counter.safe_limit() {
            out.push(Chunk::new(content, meta.clone().with(keys::TOKEN_COUNT, tokens)));
            return;
        }

        let group_id = new_split_group_id("py_split");
        for (idx, piece) in self.fallback.split(content).into_iter().enumerate() {
            let metadata = meta
                .clone()
                .with(keys::CHUNK_INDEX, idx)
                .with(keys::SPLIT_METHOD, FALLBACK_METHOD)
                .with(keys::TOKEN_COUNT, self.counter.count(&piece))
                .with(keys::SPLIT_GROUP_ID, group_id.as_str());
            out.push(Chunk::new(piece, metadata));
        }
    }
}

impl Segmenter for SourceSegmenter {
    fn segment(&self, raw: &str, source: &str) -> Vec<Chunk> {
        let comment = self.language.line_comment().unwrap_or("#");
        let cleaned = strip_license_header(raw, comment).trim();
        if cleaned.is_empty() {
            return Vec::new();
        }

        let parsed = match self.parse(cleaned) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("{source}: {e}; emitting whole file as one chunk");
                return vec![self.passthrough(cleaned, source)];
            }
        };

        let base = Metadata::new()
            .with(keys::SOURCE, source)
            .with(keys::LANGUAGE, self.language.as_str())
            .with(keys::DEPENDENCIES, parsed.imports)
            .with(keys::CONTENT_TYPE, CONTENT_TYPE);

        let mut chunks = Vec::new();
        for unit in &parsed.units {
            match unit.kind {
                UnitKind::Class => self.class_chunks(unit, &base, &mut chunks),
                UnitKind::Function => self.function_chunks(unit, &base, &mut chunks),
                UnitKind::Statement => {
                    let meta = base
                        .clone()
                        .with(keys::TYPE, ChunkType::ModuleLevel.as_str());
                    self.emit(&unit.text, &meta, &mut chunks);
                }
            }
        }
        chunks
    }
}

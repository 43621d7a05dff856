//! Cell-buffer segmentation of notebook exports.
//!
//! Consecutive small cells are packed into one buffer until the next cell would
//! overflow the safe limit. A cell that is too large on its own is split by
//! type: text cells along their headings, code cells with the block splitter.

use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::masking::{self, mask, MaskRule, LATEX_MARKERS};
use crate::reassembly::Reassembler;
use crate::sections::{with_content_flags, SectionChunker};
use crate::segmenter::Segmenter;
use crate::tokens::TokenCounter;
use crate::types::{keys, new_split_group_id, CellStrategy, Chunk, Metadata};
use serde::Deserialize;
use serde_json::Value;

/// Notebook export: file metadata plus ordered cells
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub metadata: NotebookMetadata,
    #[serde(default)]
    pub content: Vec<Cell>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default)]
    pub filename: Option<String>,
    /// Library version the notebook targets
    #[serde(default, alias = "qiskit_version")]
    pub version: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    #[default]
    #[serde(other)]
    Text,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cell {
    #[serde(rename = "type", default)]
    pub kind: CellKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub output: Option<String>,
}

impl Cell {
    /// Cell text as chunked: code cells carry their non-blank output in a
    /// labelled fence
    pub fn formatted(&self) -> String {
        match (&self.kind, self.output.as_deref()) {
            (CellKind::Code, Some(output)) if !output.trim().is_empty() => {
                format!("{}\nOutput:\n```text\n{output}\n```", self.content)
            }
            _ => self.content.clone(),
        }
    }
}

impl Notebook {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    fn version(&self) -> Option<String> {
        match self.metadata.version.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Pending run of small cells
struct CellBuffer {
    texts: Vec<String>,
    start: usize,
    end: usize,
}

impl CellBuffer {
    fn joined(&self) -> String {
        self.texts.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct NotebookSegmenter {
    counter: TokenCounter,
    rules: Vec<MaskRule>,
    reassembler: Reassembler,
    sections: SectionChunker,
}

impl NotebookSegmenter {
    pub fn new(counter: &TokenCounter, config: &ChunkerConfig) -> Result<Self> {
        let reassembler = Reassembler::new(counter, config);
        Ok(Self {
            counter: counter.clone(),
            rules: masking::rules(&[(LATEX_MARKERS, "LATEX")])?,
            sections: SectionChunker::new(
                reassembler.clone(),
                config.section_overlap(),
                "large_block",
            ),
            reassembler,
        })
    }

    /// Segment an already-parsed notebook
    pub fn segment_notebook(&self, notebook: &Notebook, source: &str) -> Vec<Chunk> {
        let base = Metadata::new()
            .with(
                keys::SOURCE,
                notebook
                    .metadata
                    .filename
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(source),
            )
            .with(keys::VERSION, notebook.version());

        let limit = self.counter.safe_limit();
        let mut chunks = Vec::new();
        let mut buffer: Option<CellBuffer> = None;
        // Blank cells take no index, so cell ranges never have gaps
        let cells = notebook
            .content
            .iter()
            .map(|cell| (cell.kind, cell.formatted()))
            .filter(|(_, text)| !text.trim().is_empty());

        for (index, (kind, text)) in cells.enumerate() {
            if self.counter.count(&text) > limit {
                if let Some(pending) = buffer.take() {
                    chunks.extend(self.flush(&pending, &base));
                }
                chunks.extend(self.large_cell(&text, kind, index, &base));
                continue;
            }

            match buffer.as_mut() {
                Some(pending) => {
                    let candidate = format!("{}\n{text}", pending.joined());
                    if self.counter.count(&candidate) > limit {
                        chunks.extend(self.flush(pending, &base));
                        *pending = CellBuffer {
                            texts: vec![text],
                            start: index,
                            end: index,
                        };
                    } else {
                        pending.texts.push(text);
                        pending.end = index;
                    }
                }
                None => {
                    buffer = Some(CellBuffer {
                        texts: vec![text],
                        start: index,
                        end: index,
                    });
                }
            }
        }

        if let Some(pending) = buffer {
            chunks.extend(self.flush(&pending, &base));
        }
        chunks
    }

    fn flush(&self, buffer: &CellBuffer, base: &Metadata) -> Vec<Chunk> {
        let text = buffer.joined();
        let masked = mask(text.trim(), &self.rules);

        let template = base
            .clone()
            .with(keys::CELL_RANGE, format!("{}-{}", buffer.start, buffer.end))
            .with(keys::STRATEGY, CellStrategy::Buffer.as_str());

        self.reassembler
            .reassemble(&masked, &template)
            .into_iter()
            .map(with_content_flags)
            .collect()
    }

    fn large_cell(&self, text: &str, kind: CellKind, index: usize, base: &Metadata) -> Vec<Chunk> {
        let group_id = new_split_group_id("large_block");
        log::debug!("Cell {index} exceeds limit, splitting as {group_id}");

        let template = base
            .clone()
            .with(keys::CELL_INDEX, index)
            .with(keys::SPLIT_GROUP_ID, group_id);

        match kind {
            CellKind::Text => {
                let masked = mask(text, &self.rules);
                let template = template.with(keys::STRATEGY, CellStrategy::MarkdownHeader.as_str());
                self.sections.chunk(&masked, &template)
            }
            CellKind::Code => {
                let template = template.with(keys::STRATEGY, CellStrategy::LargeCodeSplit.as_str());
                self.reassembler
                    .block_splitter()
                    .split(text)
                    .into_iter()
                    .map(|piece| {
                        let metadata = template
                            .clone()
                            .with(keys::TOKEN_COUNT, self.counter.count(&piece));
                        with_content_flags(Chunk::new(piece, metadata))
                    })
                    .collect()
            }
        }
    }
}

impl Segmenter for NotebookSegmenter {
    fn segment(&self, raw: &str, source: &str) -> Vec<Chunk> {
        if raw.trim().is_empty() {
            return Vec::new();
        }

        match Notebook::from_json(raw) {
            Ok(notebook) => self.segment_notebook(&notebook, source),
            Err(e) => {
                log::warn!("{source}: skipping malformed notebook: {e}");
                Vec::new()
            }
        }
    }
}

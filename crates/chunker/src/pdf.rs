use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::markdown::STRUCTURED_TEXT_RULES;
use crate::masking::{self, mask, MaskRule, LATEX_BLOCK, LATEX_INLINE};
use crate::reassembly::Reassembler;
use crate::sections::SectionChunker;
use crate::segmenter::Segmenter;
use crate::tokens::TokenCounter;
use crate::types::{keys, Chunk, Metadata};
use once_cell::sync::Lazy;
use regex::Regex;

static FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\r?\n.*?\r?\n---\r?\n").expect("front matter pattern is valid"));
static STYLE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<span[^>]*>(.*?)</span>").expect("span pattern is valid"));
static SUPERSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<sup>(.*?)</sup>").expect("superscript pattern is valid"));

/// Strip PDF-to-markdown residue: leading front matter, inline style spans and
/// superscript tags (rewritten as `[n]`)
pub fn clean_artifacts(text: &str) -> String {
    let text = FRONT_MATTER.replace(text, "");
    let text = STYLE_SPAN.replace_all(&text, "$1");
    SUPERSCRIPT.replace_all(&text, "[$1]").into_owned()
}

/// Artifact-cleaning variant of the header-structure segmenter
#[derive(Debug, Clone)]
pub struct PdfSegmenter {
    rules: Vec<MaskRule>,
    sections: SectionChunker,
}

impl PdfSegmenter {
    pub fn new(counter: &TokenCounter, config: &ChunkerConfig) -> Result<Self> {
        let mut specs = STRUCTURED_TEXT_RULES.to_vec();
        // Display math first so inline `$` pairs never span a `$$` block
        specs.push((LATEX_BLOCK, "LATEX_BLOCK"));
        specs.push((LATEX_INLINE, "LATEX_INLINE"));

        let reassembler = Reassembler::new(counter, config);
        Ok(Self {
            rules: masking::rules(&specs)?,
            sections: SectionChunker::new(reassembler, config.pdf_section_overlap, "pdf_section"),
        })
    }
}

impl Segmenter for PdfSegmenter {
    fn segment(&self, raw: &str, source: &str) -> Vec<Chunk> {
        let cleaned = clean_artifacts(raw);
        if cleaned.trim().is_empty() {
            return Vec::new();
        }

        let masked = mask(&cleaned, &self.rules);
        let base = Metadata::new().with(keys::SOURCE, source);
        self.sections.chunk(&masked, &base)
    }
}

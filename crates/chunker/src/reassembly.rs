//! Buffered reassembly.
//!
//! Walks masked text in document order, restoring protected spans one at a
//! time and packing literal runs and spans into a token-bounded buffer. Anything
//! that cannot fit on its own is handed to a recursive splitter, so no chunk
//! leaves here above the safe limit.

use crate::config::ChunkerConfig;
use crate::masking::{segments, MaskMap, MaskedText, Segment};
use crate::splitter::{RecursiveSplitter, TEXT_SEPARATORS};
use crate::tokens::TokenCounter;
use crate::types::{keys, new_split_group_id, Chunk, Metadata};

const HUGE_BLOCK_METHOD: &str = "huge_block_split";
const HUGE_BLOCK_TYPE: &str = "code_or_latex";

/// Shared sizing stage every segmenter delegates to
#[derive(Debug, Clone)]
pub struct Reassembler {
    counter: TokenCounter,
    text_splitter: RecursiveSplitter,
    block_splitter: RecursiveSplitter,
}

impl Reassembler {
    pub fn new(counter: &TokenCounter, config: &ChunkerConfig) -> Self {
        Self {
            counter: counter.clone(),
            text_splitter: RecursiveSplitter::text(counter, config.text_overlap),
            block_splitter: RecursiveSplitter::new(
                counter.clone(),
                counter.safe_limit(),
                config.block_overlap,
                TEXT_SEPARATORS,
            ),
        }
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Splitter used for oversized protected spans and code cells
    pub fn block_splitter(&self) -> &RecursiveSplitter {
        &self.block_splitter
    }

    /// Restore and size `masked`, producing chunks that carry `template`.
    pub fn reassemble(&self, masked: &MaskedText, template: &Metadata) -> Vec<Chunk> {
        self.reassemble_with(&masked.text, &masked.spans, template)
    }

    /// Same as [`Self::reassemble`] for a fragment of a larger masked text
    pub fn reassemble_with(&self, text: &str, spans: &MaskMap, template: &Metadata) -> Vec<Chunk> {
        let limit = self.counter.safe_limit();
        let mut chunks = Vec::new();
        let mut buffer = String::new();

        for segment in segments(text, spans) {
            match segment {
                Segment::Text(run) => {
                    let candidate = format!("{buffer}{run}");
                    if self.counter.count(&candidate) > limit {
                        chunks.extend(self.finalize(&buffer, template));
                        buffer = run.to_string();
                    } else {
                        buffer = candidate;
                    }
                }
                Segment::Protected(span) => {
                    if self.counter.count(span) > limit {
                        chunks.extend(self.finalize(&buffer, template));
                        buffer.clear();
                        chunks.extend(self.split_protected(span, template));
                        continue;
                    }

                    let candidate = format!("{buffer}{span}");
                    if self.counter.count(&candidate) <= limit {
                        buffer = candidate;
                    } else {
                        chunks.extend(self.finalize(&buffer, template));
                        buffer = span.to_string();
                    }
                }
            }
        }

        chunks.extend(self.finalize(&buffer, template));
        chunks
    }

    /// Emit `text` as one chunk, or force-split it when it is still too large.
    /// Whitespace-only text yields nothing.
    pub fn finalize(&self, text: &str, template: &Metadata) -> Vec<Chunk> {
        let content = text.trim();
        if content.is_empty() {
            return Vec::new();
        }

        let tokens = self.counter.count(content);
        if tokens <= self.counter.safe_limit() {
            let metadata = template.clone().with(keys::TOKEN_COUNT, tokens);
            return vec![Chunk::new(content, metadata)];
        }

        log::debug!(
            "Forcing split of {tokens}-token buffer (limit {})",
            self.counter.safe_limit()
        );
        self.split_with(&self.text_splitter, content, template, "forced_split", |_| {})
    }

    /// Split a protected span that exceeds the limit on its own
    pub fn split_protected(&self, span: &str, template: &Metadata) -> Vec<Chunk> {
        log::debug!(
            "Protected span of {} tokens exceeds limit {}, splitting",
            self.counter.count(span),
            self.counter.safe_limit()
        );
        self.split_with(&self.block_splitter, span, template, "huge_block", |meta| {
            meta.insert(keys::SPLIT_METHOD, HUGE_BLOCK_METHOD);
            meta.insert(keys::ORIGINAL_BLOCK_TYPE, HUGE_BLOCK_TYPE);
        })
    }

    fn split_with(
        &self,
        splitter: &RecursiveSplitter,
        text: &str,
        template: &Metadata,
        group_prefix: &str,
        decorate: impl Fn(&mut Metadata),
    ) -> Vec<Chunk> {
        let pieces = splitter.split(text);
        if pieces.len() == 1 {
            let content = &pieces[0];
            let metadata = template
                .clone()
                .with(keys::TOKEN_COUNT, self.counter.count(content));
            return vec![Chunk::new(content.as_str(), metadata)];
        }

        // Always a fresh group, even inside an already-split section
        let group_id = new_split_group_id(group_prefix);

        pieces
            .into_iter()
            .enumerate()
            .map(|(idx, piece)| {
                let mut metadata = template.clone();
                decorate(&mut metadata);
                metadata.insert(keys::CHUNK_INDEX_SUB, idx);
                metadata.insert(keys::TOKEN_COUNT, self.counter.count(&piece));
                metadata.insert(keys::SPLIT_GROUP_ID, group_id.as_str());
                Chunk::new(piece, metadata)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::{mask, rules, CODE_FENCE};
    use pretty_assertions::assert_eq;

    fn reassembler(target: usize) -> Reassembler {
        let config = ChunkerConfig::with_target_limit(target);
        let counter = TokenCounter::new(&config).unwrap();
        Reassembler::new(&counter, &config)
    }

    fn template() -> Metadata {
        Metadata::new().with(keys::SOURCE, "doc.md")
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        let engine = reassembler(2000);
        let chunks = engine.reassemble(&MaskedText::plain("  Hello world.\n"), &template());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello world.");
        assert_eq!(chunks[0].metadata.get_str(keys::SOURCE), Some("doc.md"));
        assert!(chunks[0].token_count().unwrap() > 0);
        assert_eq!(chunks[0].split_group_id(), None);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        let engine = reassembler(2000);
        assert!(engine.reassemble(&MaskedText::plain(" \n\t "), &template()).is_empty());
        assert!(engine.reassemble(&MaskedText::plain(""), &template()).is_empty());
    }

    #[test]
    fn test_spans_are_restored_intact() {
        let engine = reassembler(2000);
        let text = "Intro\n```python\nprint('hi')\n```\nOutro";
        let masked = mask(text, &rules(&[(CODE_FENCE, "STD_CODE")]).unwrap());
        let chunks = engine.reassemble(&masked, &template());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert!(!chunks[0].content.contains("__PROTECTED_"));
    }

    #[test]
    fn test_oversized_buffer_is_force_split() {
        let engine = reassembler(250);
        let chunks = engine.reassemble(&MaskedText::plain("data ".repeat(600)), &template());

        assert!(chunks.len() > 1);
        let group = chunks[0].split_group_id().unwrap().to_string();
        assert!(group.starts_with("forced_split_"));
        for (idx, chunk) in chunks.iter().enumerate() {
            assert!(chunk.token_count().unwrap() <= 225);
            assert_eq!(chunk.split_group_id(), Some(group.as_str()));
            assert_eq!(chunk.metadata.get_u64(keys::CHUNK_INDEX_SUB), Some(idx as u64));
        }
    }

    #[test]
    fn test_huge_span_is_split_and_flushes_buffer() {
        let engine = reassembler(250);
        let code = format!("```\n{}```", "x = compute(x)\n".repeat(150));
        let text = format!("Before the block.\n{code}\nAfter the block.");
        let masked = mask(&text, &rules(&[(CODE_FENCE, "STD_CODE")]).unwrap());
        let chunks = engine.reassemble(&masked, &template());

        assert_eq!(chunks.first().unwrap().content, "Before the block.");
        assert_eq!(chunks.last().unwrap().content, "After the block.");

        let middle = &chunks[1..chunks.len() - 1];
        assert!(middle.len() > 1);
        for chunk in middle {
            assert_eq!(chunk.metadata.get_str(keys::SPLIT_METHOD), Some("huge_block_split"));
            assert_eq!(
                chunk.metadata.get_str(keys::ORIGINAL_BLOCK_TYPE),
                Some("code_or_latex")
            );
            assert!(chunk.split_group_id().unwrap().starts_with("huge_block_"));
            assert!(chunk.token_count().unwrap() <= 225);
        }
    }

    #[test]
    fn test_span_that_overflows_buffer_starts_new_chunk() {
        let engine = reassembler(250);
        let prose = "Some words here. ".repeat(40);
        let code = format!("```\n{}```", "y = 1\n".repeat(40));
        let text = format!("{prose}{code}");
        let masked = mask(&text, &rules(&[(CODE_FENCE, "STD_CODE")]).unwrap());
        let chunks = engine.reassemble(&masked, &template());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, prose.trim());
        assert_eq!(chunks[1].content, code);
    }

    #[test]
    fn test_split_pieces_get_their_own_group() {
        let engine = reassembler(250);
        let meta = template().with(keys::SPLIT_GROUP_ID, "md_section_aaaa0000");
        let body: String = (0..150).map(|i| format!("step_{i} = apply(step_{i})\n")).collect();
        let text = format!("intro\n```python\n{body}```");
        let masked = mask(&text, &rules(&[(CODE_FENCE, "STD_CODE")]).unwrap());
        let chunks = engine.reassemble(&masked, &meta);

        assert_eq!(chunks[0].content, "intro");
        assert_eq!(chunks[0].split_group_id(), Some("md_section_aaaa0000"));

        let pieces = &chunks[1..];
        assert!(pieces.len() > 1);
        let group = pieces[0].split_group_id().unwrap();
        assert!(group.starts_with("huge_block_"));
        for piece in pieces {
            assert_eq!(piece.split_group_id(), Some(group));
            assert_eq!(piece.metadata.get_str(keys::SPLIT_METHOD), Some("huge_block_split"));
        }

        let forced = engine.reassemble(&MaskedText::plain("data ".repeat(600)), &meta);
        assert!(forced.len() > 1);
        assert!(forced
            .iter()
            .all(|c| c.split_group_id().is_some_and(|g| g.starts_with("forced_split_"))));
    }
}

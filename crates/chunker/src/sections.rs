use crate::headings::split_sections;
use crate::masking::MaskedText;
use crate::reassembly::Reassembler;
use crate::splitter::RecursiveSplitter;
use crate::types::{keys, new_split_group_id, Chunk, Metadata};

/// Heading-structured chunking over already-masked markdown.
///
/// Splits on headings, sub-splits any section above the safe limit with a
/// heading-aware splitter (all pieces sharing one split group), then hands each
/// piece to the reassembler to restore protected spans.
#[derive(Debug, Clone)]
pub struct SectionChunker {
    reassembler: Reassembler,
    sub_splitter: RecursiveSplitter,
    group_prefix: &'static str,
}

impl SectionChunker {
    pub fn new(reassembler: Reassembler, overlap: usize, group_prefix: &'static str) -> Self {
        let sub_splitter = RecursiveSplitter::section(reassembler.counter(), overlap);
        Self {
            reassembler,
            sub_splitter,
            group_prefix,
        }
    }

    pub fn chunk(&self, masked: &MaskedText, base: &Metadata) -> Vec<Chunk> {
        let counter = self.reassembler.counter();
        let mut chunks = Vec::new();

        for section in split_sections(&masked.text) {
            let mut template = base.clone();
            template.extend(&section.heading_metadata());

            let pieces = if counter.count(&section.content) > counter.safe_limit() {
                let group_id = base
                    .get_str(keys::SPLIT_GROUP_ID)
                    .map_or_else(|| new_split_group_id(self.group_prefix), str::to_string);
                log::debug!(
                    "Section '{}' exceeds limit, sub-splitting as {group_id}",
                    section.context_path()
                );
                template.insert(keys::SPLIT_GROUP_ID, group_id);
                self.sub_splitter.split(&section.content)
            } else {
                vec![section.content]
            };

            for piece in &pieces {
                let restored = self
                    .reassembler
                    .reassemble_with(piece, &masked.spans, &template);
                chunks.extend(restored.into_iter().map(with_content_flags));
            }
        }

        chunks
    }
}

/// Set `has_code`/`has_latex` from the chunk's own text
pub fn with_content_flags(mut chunk: Chunk) -> Chunk {
    let has_code = chunk.content.contains("```");
    let has_latex = chunk.content.contains('$') || chunk.content.contains("LATEX");
    chunk.metadata.insert(keys::HAS_CODE, has_code);
    chunk.metadata.insert(keys::HAS_LATEX, has_latex);
    chunk
}

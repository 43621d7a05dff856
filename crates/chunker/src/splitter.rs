use crate::tokens::TokenCounter;
use std::collections::VecDeque;

/// Separators for prose: paragraphs, lines, words, characters
pub const TEXT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Separators for source code, biased toward declaration boundaries
pub const SOURCE_SEPARATORS: &[&str] = &[
    "\nclass ",
    "\ndef ",
    "\n\tdef ",
    "\n    def ",
    "\n\n",
    "\n",
    " ",
    "",
];

/// Separators for oversized markdown sections, preferring heading lines
pub const SECTION_SEPARATORS: &[&str] = &["\n#", "\n\n", "\n", " ", ""];

/// Recursive splitter measured in tokens.
///
/// Tries separators from most to least meaningful, keeps each separator at the
/// start of the piece that follows it, greedily merges small pieces up to the
/// chunk size and carries up to `overlap` tokens of trailing context into the
/// next chunk. Every returned piece is within the chunk size.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    counter: TokenCounter,
    chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Overlap is capped at half the chunk size so merging always advances.
    pub fn new(
        counter: TokenCounter,
        chunk_size: usize,
        overlap: usize,
        separators: &[&str],
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            counter,
            chunk_size,
            overlap: overlap.min(chunk_size / 2),
            separators: separators.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Prose splitter sized to the safe limit
    pub fn text(counter: &TokenCounter, overlap: usize) -> Self {
        Self::new(counter.clone(), counter.safe_limit(), overlap, TEXT_SEPARATORS)
    }

    /// Source-code splitter sized to the safe limit
    pub fn source(counter: &TokenCounter, overlap: usize) -> Self {
        Self::new(counter.clone(), counter.safe_limit(), overlap, SOURCE_SEPARATORS)
    }

    /// Heading-aware splitter for oversized sections
    pub fn section(counter: &TokenCounter, overlap: usize) -> Self {
        Self::new(counter.clone(), counter.safe_limit(), overlap, SECTION_SEPARATORS)
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into trimmed, non-empty pieces within the chunk size
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
            .into_iter()
            .flat_map(|piece| self.enforce(piece))
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);
        let splits = split_keeping_separator(text, separator);

        let mut out = Vec::new();
        let mut small: Vec<(&str, usize)> = Vec::new();

        for piece in splits {
            let tokens = self.counter.count(piece);
            if tokens < self.chunk_size {
                small.push((piece, tokens));
                continue;
            }

            if !small.is_empty() {
                out.extend(self.merge(&small));
                small.clear();
            }

            if remaining.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_recursive(piece, remaining));
            }
        }

        if !small.is_empty() {
            out.extend(self.merge(&small));
        }

        out
    }

    /// Greedy merge with a sliding overlap window
    fn merge(&self, pieces: &[(&str, usize)]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &(piece, tokens) in pieces {
            if total + tokens > self.chunk_size && !window.is_empty() {
                push_joined(&mut docs, &window);
                while total > self.overlap || (total > 0 && total + tokens > self.chunk_size) {
                    let Some((_, dropped)) = window.pop_front() else {
                        break;
                    };
                    total -= dropped;
                }
            }
            window.push_back((piece, tokens));
            total += tokens;
        }

        push_joined(&mut docs, &window);
        docs
    }

    /// Bisect any piece whose joined token count still exceeds the chunk size
    fn enforce(&self, piece: String) -> Vec<String> {
        if self.counter.count(&piece) <= self.chunk_size {
            return vec![piece];
        }

        let Some(cut) = bisect_point(&piece) else {
            log::debug!(
                "Piece of {} bytes cannot be split further within {} tokens",
                piece.len(),
                self.chunk_size
            );
            return vec![piece];
        };

        let (left, right) = piece.split_at(cut);
        let mut out = Vec::new();
        for half in [left.trim(), right.trim()] {
            if !half.is_empty() {
                out.extend(self.enforce(half.to_string()));
            }
        }
        out
    }
}

fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    for (idx, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator, &separators[idx + 1..]);
        }
    }
    (separators.last().map_or("", String::as_str), &[])
}

/// Split so each separator occurrence starts the following piece
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(idx, ch)| &text[idx..idx + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Whitespace closest to the middle of `text`, else the middle char boundary
fn bisect_point(text: &str) -> Option<usize> {
    let mid = text.len() / 2;
    let best_space = text
        .char_indices()
        .filter(|(idx, ch)| *idx > 0 && ch.is_whitespace())
        .map(|(idx, _)| idx)
        .min_by_key(|idx| idx.abs_diff(mid));
    if best_space.is_some() {
        return best_space;
    }

    let mut cut = mid;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut == 0 {
        cut = text.char_indices().nth(1).map(|(idx, _)| idx)?;
    }
    Some(cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkerConfig;
    use pretty_assertions::assert_eq;

    fn counter() -> TokenCounter {
        TokenCounter::new(&ChunkerConfig::default()).unwrap()
    }

    #[test]
    fn test_small_text_is_one_piece() {
        let splitter = RecursiveSplitter::new(counter(), 100, 10, TEXT_SEPARATORS);
        assert_eq!(splitter.split("  hello world  "), vec!["hello world".to_string()]);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n ").is_empty());
    }

    #[test]
    fn test_pieces_respect_chunk_size() {
        let counter = counter();
        let splitter = RecursiveSplitter::new(counter.clone(), 40, 8, TEXT_SEPARATORS);
        let text = (0..30)
            .map(|i| format!("Paragraph {i} has a handful of ordinary words in it."))
            .collect::<Vec<_>>()
            .join("\n\n");

        let pieces = splitter.split(&text);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(counter.count(piece) <= 40, "piece too large: {piece}");
        }
        assert!(pieces[0].starts_with("Paragraph 0"));
        assert!(pieces.last().unwrap().ends_with("Paragraph 29 has a handful of ordinary words in it."));
    }

    #[test]
    fn test_overlap_repeats_trailing_context() {
        let counter = counter();
        let splitter = RecursiveSplitter::new(counter, 12, 6, TEXT_SEPARATORS);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi rho sigma";
        let pieces = splitter.split(text);

        assert!(pieces.len() >= 2);
        let first_last_word = pieces[0].split_whitespace().last().unwrap();
        assert!(pieces[1].contains(first_last_word));
    }

    #[test]
    fn test_separator_starts_following_piece() {
        assert_eq!(
            split_keeping_separator("a\ndef b\ndef c", "\ndef "),
            vec!["a", "\ndef b", "\ndef c"]
        );
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
        assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
    }

    #[test]
    fn test_source_splitter_prefers_def_boundaries() {
        let counter = counter();
        let body = "    value = compute(value)\n".repeat(12);
        let text = format!("def first():\n{body}\ndef second():\n{body}");
        let size = counter.count(&text) / 2 + 10;
        let splitter = RecursiveSplitter::new(counter, size, 0, SOURCE_SEPARATORS);

        let pieces = splitter.split(&text);
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].starts_with("def first():"));
        assert!(pieces[1].starts_with("def second():"));
    }

    #[test]
    fn test_unbreakable_text_is_bisected() {
        let counter = counter();
        let splitter = RecursiveSplitter::new(counter.clone(), 5, 0, &["\n\n"]);
        let pieces = splitter.split(&"token ".repeat(40));
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(counter.count(piece) <= 5);
        }
    }

    #[test]
    fn test_overlap_capped_at_half_chunk() {
        let splitter = RecursiveSplitter::new(counter(), 100, 200, TEXT_SEPARATORS);
        assert_eq!(splitter.overlap(), 50);
    }

    #[test]
    fn test_bisect_point() {
        assert_eq!(bisect_point("aaaa bbbb"), Some(4));
        assert_eq!(bisect_point("abcd"), Some(2));
        assert_eq!(bisect_point("é"), None);
    }
}

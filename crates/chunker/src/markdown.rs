//! Header-structure segmentation of web and API documentation records.

use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::masking::{self, mask, MaskRule, CODE_FENCE, CODE_WITH_OUTPUT, LATEX_MARKERS};
use crate::reassembly::Reassembler;
use crate::sections::SectionChunker;
use crate::segmenter::Segmenter;
use crate::tokens::TokenCounter;
use crate::types::{keys, Chunk, Metadata};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;

static HTML_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<h([1-6])>(.*?)</h([1-6])>").expect("html heading pattern is valid")
});

const CONTENT_TYPE: &str = "text_mixed";

/// Masking rules shared by every header-structured format, in priority order
pub const STRUCTURED_TEXT_RULES: &[(&str, &str)] = &[
    (LATEX_MARKERS, "LATEX"),
    (CODE_WITH_OUTPUT, "WEB_CODE"),
    (CODE_FENCE, "STD_CODE"),
];

/// One scraped documentation page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebRecord {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub metadata: Option<RecordMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordMetadata {
    /// Source files downloaded alongside the page
    #[serde(default, alias = "downloaded_py_files")]
    pub downloaded_reference_files: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<WebRecord>),
    One(WebRecord),
}

impl WebRecord {
    /// Parse a single record or a list of records
    pub fn parse_many(raw: &str) -> Result<Vec<WebRecord>> {
        Ok(match serde_json::from_str(raw)? {
            OneOrMany::Many(records) => records,
            OneOrMany::One(record) => vec![record],
        })
    }

    fn topic(&self) -> Option<&str> {
        [self.topic.as_deref(), self.title.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
    }

    fn base_metadata(&self, fallback_source: &str) -> Metadata {
        let source = self
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(fallback_source);

        let mut meta = Metadata::new()
            .with(keys::SOURCE, source)
            .with(keys::TOPIC, self.topic())
            .with(keys::CONTENT_TYPE, CONTENT_TYPE);

        let related = self
            .metadata
            .as_ref()
            .map(|m| m.downloaded_reference_files.join(", "))
            .unwrap_or_default();
        meta.insert(keys::RELATED_SOURCE_FILE, related);
        meta
    }
}

/// Rewrite `<hN>title</hN>` into `N` hashes followed by the title
pub fn convert_html_headings(text: &str) -> String {
    HTML_HEADING
        .replace_all(text, |caps: &Captures| {
            if caps[1] != caps[3] {
                return caps[0].to_string();
            }
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("{} {}", "#".repeat(level), caps[2].trim())
        })
        .into_owned()
}

/// Segmenter for JSON web/API records
#[derive(Debug, Clone)]
pub struct MarkdownSegmenter {
    rules: Vec<MaskRule>,
    sections: SectionChunker,
}

impl MarkdownSegmenter {
    pub fn new(counter: &TokenCounter, config: &ChunkerConfig) -> Result<Self> {
        let reassembler = Reassembler::new(counter, config);
        Ok(Self {
            rules: masking::rules(STRUCTURED_TEXT_RULES)?,
            sections: SectionChunker::new(reassembler, config.section_overlap(), "md_section"),
        })
    }

    /// Segment one already-parsed record
    pub fn segment_record(&self, record: &WebRecord, source: &str) -> Vec<Chunk> {
        let Some(content) = record.content.as_deref().filter(|c| !c.trim().is_empty()) else {
            return Vec::new();
        };

        let normalized = convert_html_headings(content);
        let masked = mask(&normalized, &self.rules);
        self.sections.chunk(&masked, &record.base_metadata(source))
    }
}

impl Segmenter for MarkdownSegmenter {
    fn segment(&self, raw: &str, source: &str) -> Vec<Chunk> {
        if raw.trim().is_empty() {
            return Vec::new();
        }

        match WebRecord::parse_many(raw) {
            Ok(records) => records
                .iter()
                .flat_map(|record| self.segment_record(record, source))
                .collect(),
            Err(e) => {
                log::warn!("{source}: skipping malformed web record: {e}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn segmenter(target: usize) -> MarkdownSegmenter {
        let config = ChunkerConfig::with_target_limit(target);
        MarkdownSegmenter::new(&TokenCounter::new(&config).unwrap(), &config).unwrap()
    }

    fn record(content: &str) -> String {
        json!({"content": content, "url": "http://test.com", "title": "Test"}).to_string()
    }

    #[test]
    fn test_convert_html_headings() {
        assert_eq!(convert_html_headings("<h2>Setup</h2>\ntext"), "## Setup\ntext");
        assert_eq!(convert_html_headings("<H1> Title </H1>"), "# Title");
        assert_eq!(convert_html_headings("<h2>odd</h3>"), "<h2>odd</h3>");
    }

    #[test]
    fn test_split_by_headers() {
        let chunks = segmenter(1000).segment(
            &record("# Section 1\nContent 1.\n# Section 2\nContent 2."),
            "page.json",
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].context_path(), Some("Section 1"));
        assert_eq!(chunks[1].context_path(), Some("Section 2"));
        assert_eq!(chunks[0].metadata.get_str(keys::SOURCE), Some("http://test.com"));
        assert_eq!(chunks[0].metadata.get_str(keys::TOPIC), Some("Test"));
        assert_eq!(chunks[0].metadata.get_str(keys::CONTENT_TYPE), Some("text_mixed"));
    }

    #[test]
    fn test_code_comment_is_not_a_heading() {
        let content = "    # Real Header\n    Some text.\n\n```bash\n# This is a comment, not a header\nls -la\n```\n";
        let chunks = segmenter(1000).segment(&record(content), "page.json");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].context_path(), Some("Real Header"));
        assert!(chunks[0].content.contains("# This is a comment, not a header"));
        assert_eq!(chunks[0].metadata.get_bool(keys::HAS_CODE), Some(true));
    }

    #[test]
    fn test_latex_markers_are_protected() {
        let content = "# Math\nEnergy: [LATEX_START]E = mc^2[LATEX_END] holds.";
        let chunks = segmenter(1000).segment(&record(content), "page.json");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("[LATEX_START]E = mc^2[LATEX_END]"));
        assert_eq!(chunks[0].metadata.get_bool(keys::HAS_LATEX), Some(true));
    }

    #[test]
    fn test_latex_inside_code_with_output_survives() {
        let content = "# Example\n```python\nx = 1\n```\nwhere [LATEX_START]x^2[LATEX_END] holds\n```python\nprint(x)\n```\nOutput:\n```text\n1\n```";
        let chunks = segmenter(1000).segment(&record(content), "page.json");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("[LATEX_START]x^2[LATEX_END]"));
        assert!(!chunks[0].content.contains("__PROTECTED_"));
        assert_eq!(chunks[0].content, content);
    }

    #[test]
    fn test_record_list_and_related_files() {
        let raw = json!([
            {"content": "# A\nfoo", "topic": "Circuits", "title": "ignored",
             "metadata": {"downloaded_py_files": ["a.py", "b.py"]}},
            {"content": "", "url": "http://empty"},
            {"content": "# B\nbar", "url": ""}
        ])
        .to_string();
        let chunks = segmenter(1000).segment(&raw, "records.json");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.get_str(keys::TOPIC), Some("Circuits"));
        assert_eq!(
            chunks[0].metadata.get_str(keys::RELATED_SOURCE_FILE),
            Some("a.py, b.py")
        );
        assert_eq!(chunks[0].metadata.get_str(keys::SOURCE), Some("records.json"));
        assert!(!chunks[1].metadata.contains_key(keys::RELATED_SOURCE_FILE));
        assert!(!chunks[1].metadata.contains_key(keys::TOPIC));
    }

    #[test]
    fn test_malformed_and_empty_input() {
        let segmenter = segmenter(1000);
        assert!(segmenter.segment("{invalid_json", "bad.json").is_empty());
        assert!(segmenter.segment("", "empty.json").is_empty());
        assert!(segmenter.segment(&record(""), "empty.json").is_empty());
    }
}

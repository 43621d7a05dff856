//! Span protection.
//!
//! Protected spans (code fences, LaTeX, code-with-output blocks) are swapped for
//! opaque placeholders before any structural splitting, so no splitter can cut
//! through them. The mapping back to the original text travels with the masked
//! text as a value and is consumed by the reassembly pass.

use crate::error::{ChunkerError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use uuid::Uuid;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"__PROTECTED_[A-Z_]+_[a-f0-9]+__").expect("placeholder pattern is valid")
});

/// Bracketed LaTeX emitted by the web scrapers
pub const LATEX_MARKERS: &str = r"\[LATEX_START\].*?\[LATEX_END\]";
/// Fenced code immediately followed by its recorded output block
pub const CODE_WITH_OUTPUT: &str = r"```.*?```\s*Output:\s*```.*?```";
/// Bare fenced code
pub const CODE_FENCE: &str = r"```.*?```";
/// Display math
pub const LATEX_BLOCK: &str = r"\$\$.*?\$\$";
/// Inline math; display math must already be masked
pub const LATEX_INLINE: &str = r"\$[^$]+\$";

/// One pattern and the tag its placeholders carry
#[derive(Debug, Clone)]
pub struct MaskRule {
    pattern: Regex,
    tag: String,
}

impl MaskRule {
    /// Compile a rule. Patterns run with `.` matching newlines and `^`/`$` per line.
    pub fn new(pattern: &str, tag: &str) -> Result<Self> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            return Err(ChunkerError::InvalidPattern {
                tag: tag.to_string(),
                message: "tags must be uppercase ASCII letters or underscores".to_string(),
            });
        }

        let pattern = Regex::new(&format!("(?sm){pattern}")).map_err(|e| {
            ChunkerError::InvalidPattern {
                tag: tag.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            pattern,
            tag: tag.to_string(),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// Build an ordered rule list from `(pattern, tag)` pairs
pub fn rules(specs: &[(&str, &str)]) -> Result<Vec<MaskRule>> {
    specs
        .iter()
        .map(|(pattern, tag)| MaskRule::new(pattern, tag))
        .collect()
}

/// Placeholder -> original span, scoped to one masking call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskMap(HashMap<String, String>);

impl MaskMap {
    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.0.get(placeholder).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every known placeholder in `text` with its original span
    pub fn restore(&self, text: &str) -> String {
        restore_spans(&self.0, text)
    }
}

fn restore_spans(spans: &HashMap<String, String>, text: &str) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            spans.get(token).map_or(token, String::as_str).to_string()
        })
        .into_owned()
}

/// Masked text together with the spans it hides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskedText {
    pub text: String,
    pub spans: MaskMap,
}

impl MaskedText {
    /// Text with nothing masked
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: MaskMap::default(),
        }
    }

    /// Fully restored text
    pub fn unmasked(&self) -> String {
        self.spans.restore(&self.text)
    }
}

/// Apply `rules` in order. A span consumed by an earlier rule is invisible to
/// later ones, so the more specific patterns must come first. A later match
/// that encloses earlier placeholders absorbs them: its recorded span holds
/// the restored text and the inner entries are dropped.
pub fn mask(text: &str, rules: &[MaskRule]) -> MaskedText {
    let mut spans: HashMap<String, String> = HashMap::new();
    let mut masked = text.to_string();

    for rule in rules {
        let replaced = rule.pattern.replace_all(&masked, |caps: &Captures| {
            let matched = &caps[0];
            let original = restore_spans(&spans, matched);
            for inner in PLACEHOLDER.find_iter(matched) {
                spans.remove(inner.as_str());
            }

            let placeholder = placeholder(&rule.tag);
            spans.insert(placeholder.clone(), original);
            placeholder
        });
        masked = replaced.into_owned();
    }

    MaskedText {
        text: masked,
        spans: MaskMap(spans),
    }
}

fn placeholder(tag: &str) -> String {
    format!("__PROTECTED_{tag}_{}__", Uuid::new_v4().simple())
}

/// One element of masked text, in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text between placeholders
    Text(&'a str),
    /// A protected span, restored to its original text
    Protected(&'a str),
}

/// Split masked text into alternating literal runs and protected spans.
/// Placeholder look-alikes that are not in `spans` stay literal text.
pub fn segments<'a>(masked: &'a str, spans: &'a MaskMap) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut literal_start = 0;

    for found in PLACEHOLDER.find_iter(masked) {
        let Some(original) = spans.get(found.as_str()) else {
            continue;
        };
        if found.start() > literal_start {
            out.push(Segment::Text(&masked[literal_start..found.start()]));
        }
        out.push(Segment::Protected(original));
        literal_start = found.end();
    }

    if literal_start < masked.len() {
        out.push(Segment::Text(&masked[literal_start..]));
    }

    out
}

//! Markdown heading structure.

use crate::types::{keys, Metadata};

const MAX_LEVEL: usize = 6;
const PATH_SEPARATOR: &str = " > ";

/// A markdown heading line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub text: String,
}

/// Parse `# Title` style headings. Leading indentation is ignored; the hashes
/// must be followed by whitespace.
pub fn parse_heading(line: &str) -> Option<Heading> {
    let trimmed = line.trim();
    let level = trimmed.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > MAX_LEVEL {
        return None;
    }

    let rest = &trimmed[level..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let text = rest.trim();
    if text.is_empty() {
        return None;
    }

    Some(Heading {
        level,
        text: text.to_string(),
    })
}

/// A contiguous run of lines under one heading path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section text, heading lines included
    pub content: String,
    /// Enclosing headings, outermost first
    pub headings: Vec<Heading>,
}

impl Section {
    /// `" > "`-joined heading texts, outermost first
    pub fn context_path(&self) -> String {
        self.headings
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    /// `h1`..`h6` keys for the enclosing headings plus the joined context path
    pub fn heading_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        for heading in &self.headings {
            meta.insert(format!("h{}", heading.level), heading.text.as_str());
        }
        meta.insert(keys::CONTEXT_PATH, self.context_path());
        meta
    }

    fn is_heading_only(&self) -> bool {
        self.content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .all(|line| parse_heading(line).is_some())
    }
}

/// Split markdown into sections at heading lines.
///
/// Lines inside ``` or ~~~ fences are never headings. A section holding nothing
/// but headings is folded into the following section when that one is nested
/// deeper, so a chain of headings shares the content beneath it.
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut stack: Vec<Heading> = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            lines.push(line);
            continue;
        }

        if let Some(marker) = ["```", "~~~"].into_iter().find(|m| trimmed.starts_with(m)) {
            fence = Some(marker);
            lines.push(line);
            continue;
        }

        if let Some(heading) = parse_heading(line) {
            push_section(&mut sections, &mut lines, &stack);
            while stack.last().is_some_and(|h| h.level >= heading.level) {
                stack.pop();
            }
            stack.push(heading);
        }

        lines.push(line);
    }

    push_section(&mut sections, &mut lines, &stack);
    sections
}

fn push_section(sections: &mut Vec<Section>, lines: &mut Vec<&str>, stack: &[Heading]) {
    let content = lines.join("\n");
    lines.clear();
    if content.trim().is_empty() {
        return;
    }

    if let Some(previous) = sections.last_mut() {
        if previous.is_heading_only() && previous.headings.len() < stack.len() {
            previous.content.push('\n');
            previous.content.push_str(&content);
            previous.headings = stack.to_vec();
            return;
        }
    }

    sections.push(Section {
        content,
        headings: stack.to_vec(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_heading() {
        assert_eq!(
            parse_heading("## Setup"),
            Some(Heading {
                level: 2,
                text: "Setup".to_string()
            })
        );
        assert_eq!(parse_heading("    # Indented").map(|h| h.level), Some(1));
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("####### too deep"), None);
        assert_eq!(parse_heading("# "), None);
        assert_eq!(parse_heading("plain"), None);
    }

    #[test]
    fn test_two_top_level_sections() {
        let sections = split_sections("# A\nfoo\n# B\nbar");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].content, "# A\nfoo");
        assert_eq!(sections[0].context_path(), "A");
        assert_eq!(sections[1].content, "# B\nbar");
        assert_eq!(sections[1].context_path(), "B");
    }

    #[test]
    fn test_nested_path_and_keys() {
        let sections = split_sections("# Chapter 1\n## Section A\n### Subsection X\nContent here.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].context_path(), "Chapter 1 > Section A > Subsection X");

        let meta = sections[0].heading_metadata();
        assert_eq!(meta.get_str("h1"), Some("Chapter 1"));
        assert_eq!(meta.get_str("h3"), Some("Subsection X"));
        assert_eq!(meta.get_str(keys::CONTEXT_PATH), Some("Chapter 1 > Section A > Subsection X"));
    }

    #[test]
    fn test_sibling_pops_deeper_headings() {
        let sections = split_sections("# A\n## B\nb text\n## C\nc text\n# D\nd text");
        let paths: Vec<_> = sections.iter().map(Section::context_path).collect();
        assert_eq!(paths, vec!["A > B", "A > C", "D"]);
    }

    #[test]
    fn test_fenced_lines_are_not_headings() {
        let text = "# Real\nintro\n```bash\n# comment\n```\nafter";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, text);
    }

    #[test]
    fn test_preamble_without_heading() {
        let sections = split_sections("preamble\n# A\nbody");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].context_path(), "");
        assert_eq!(sections[1].context_path(), "A");
    }

    #[test]
    fn test_empty_text_has_no_sections() {
        assert!(split_sections("").is_empty());
        assert!(split_sections("\n  \n").is_empty());
    }
}

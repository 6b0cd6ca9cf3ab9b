//! Header-aware markdown splitting.
//!
//! A new section starts at every `#` or `##` header outside fenced code. The
//! header line stays in the section text; the enclosing headers are recorded
//! in [`HeaderPath`]. Whitespace-only sections are dropped.

use crate::traits::Splitter;
use crate::types::{HeaderPath, Section};

#[derive(Debug, Clone)]
pub struct MarkdownHeaderSplitter {
    max_level: usize,
}

impl Default for MarkdownHeaderSplitter {
    fn default() -> Self { Self { max_level: 2 } }
}

impl MarkdownHeaderSplitter {
    pub fn new(max_level: usize) -> Self { Self { max_level: max_level.clamp(1, 2) } }
}

/// `(level, title)` for an ATX header line such as `## 必备原料和工具`.
fn parse_header(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 { return None; }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') { return None; }
    Some((level, rest.trim()))
}

fn flush(sections: &mut Vec<Section>, headers: &HeaderPath, lines: &mut Vec<&str>) {
    let text = lines.join("\n");
    lines.clear();
    let text = text.trim();
    if !text.is_empty() {
        sections.push(Section { headers: headers.clone(), text: text.to_string() });
    }
}

impl Splitter for MarkdownHeaderSplitter {
    fn split(&self, text: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut headers = HeaderPath::default();
        let mut lines: Vec<&str> = Vec::new();
        let mut fence: Option<&str> = None;

        for line in text.lines() {
            let trimmed = line.trim_start();
            let marker = if trimmed.starts_with("```") { Some("```") } else if trimmed.starts_with("~~~") { Some("~~~") } else { None };
            match (fence, marker) {
                (None, Some(m)) => fence = Some(m),
                (Some(open), Some(m)) if open == m => fence = None,
                _ => {}
            }
            if fence.is_none() && marker.is_none() {
                if let Some((level, title)) = parse_header(trimmed) {
                    if level <= self.max_level {
                        flush(&mut sections, &headers, &mut lines);
                        headers.enter(level, title);
                    }
                }
            }
            lines.push(line);
        }
        flush(&mut sections, &headers, &mut lines);
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE: &str = "# 红烧肉的做法\n\n预估烹饪难度：★★★★\n\n## 必备原料和工具\n\n- 五花肉\n- 冰糖\n\n## 操作\n\n### 简易版本\n\n- 焯水\n";

    #[test]
    fn splits_on_first_and_second_level_headers() {
        let sections = MarkdownHeaderSplitter::default().split(RECIPE);
        assert_eq!(sections.len(), 3);
        assert!(sections[0].text.starts_with("# 红烧肉的做法"));
        assert_eq!(sections[0].headers.h1.as_deref(), Some("红烧肉的做法"));
        assert!(sections[0].headers.h2.is_none());
        assert_eq!(sections[1].headers.h2.as_deref(), Some("必备原料和工具"));
        assert!(sections[2].text.contains("### 简易版本"), "third-level headers stay inside their section");
    }

    #[test]
    fn headers_inside_code_fences_are_ignored() {
        let text = "## 操作\n```\n# not a header\n```\n- 焯水";
        let sections = MarkdownHeaderSplitter::default().split(text);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.contains("# not a header"));
    }

    #[test]
    fn preamble_before_first_header_has_no_header_path() {
        let sections = MarkdownHeaderSplitter::default().split("intro line\n# Title\nbody");
        assert_eq!(sections.len(), 2);
        assert!(sections[0].headers.is_empty());
    }

    #[test]
    fn blank_document_yields_nothing() {
        assert!(MarkdownHeaderSplitter::default().split(" \n\n\t").is_empty());
    }

    #[test]
    fn hashtag_without_space_is_text() {
        assert!(parse_header("#hashtag").is_none());
        assert_eq!(parse_header("## 操作"), Some((2, "操作")));
    }
}

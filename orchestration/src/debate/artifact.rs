//! SVG artifact scanning for the mandatory round-1 prototype rule.
//!
//! Two shapes count as an artifact: a fenced block explicitly labeled `svg`,
//! and a bare `<svg ...>...</svg>` element. Fenced payloads that are not
//! themselves an `<svg>` element get wrapped into a standalone one so every
//! extracted artifact renders on its own.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// ```svg ... ``` fenced block, payload captured.
static FENCED_SVG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```svg\s*(.*?)```").expect("FENCED_SVG_RE regex should compile")
});

/// Bare <svg ...>...</svg> element.
static INLINE_SVG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<svg\b.*?</svg>").expect("INLINE_SVG_RE regex should compile")
});

/// Characters of each candidate used as its deduplication key.
const DEDUP_KEY_CHARS: usize = 1200;

/// Extract every SVG block from `texts`, first-seen order, deduplicated.
///
/// Fenced matches are collected before bare matches within each text; a
/// fenced block whose payload is already an `<svg>` element also matches the
/// bare pattern, and the dedup pass keeps only the first occurrence.
pub fn extract_svg_blocks<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut found = Vec::new();
    for text in texts {
        if text.is_empty() {
            continue;
        }
        for caps in FENCED_SVG_RE.captures_iter(text) {
            let candidate = caps[1].trim();
            if candidate.to_lowercase().starts_with("<svg") {
                found.push(candidate.to_string());
            } else {
                found.push(format!(
                    "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"400\" height=\"200\">{candidate}</svg>"
                ));
            }
        }
        for m in INLINE_SVG_RE.find_iter(text) {
            found.push(m.as_str().trim().to_string());
        }
    }

    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for svg in found {
        let key: String = svg.chars().take(DEDUP_KEY_CHARS).collect();
        if seen.insert(key) {
            deduped.push(svg);
        }
    }
    deduped
}

/// Whether any of `texts` contains at least one SVG block.
pub fn contains_svg<'a>(texts: impl IntoIterator<Item = &'a str>) -> bool {
    !extract_svg_blocks(texts).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_bare_svg_block() {
        let text = "Here is my concept:\n<svg width=\"10\"><circle r=\"4\"/></svg>\nWhat do you think?";
        let blocks = extract_svg_blocks([text]);
        assert_eq!(blocks, vec!["<svg width=\"10\"><circle r=\"4\"/></svg>"]);
    }

    #[test]
    fn test_extracts_fenced_svg_with_element_payload() {
        let text = "```svg\n<svg viewBox=\"0 0 10 10\"><rect/></svg>\n```";
        let blocks = extract_svg_blocks([text]);
        assert_eq!(blocks, vec!["<svg viewBox=\"0 0 10 10\"><rect/></svg>"]);
    }

    #[test]
    fn test_wraps_fenced_payload_without_svg_element() {
        let text = "```svg\n<circle cx=\"5\" cy=\"5\" r=\"3\"/>\n```";
        let blocks = extract_svg_blocks([text]);
        assert_eq!(
            blocks,
            vec![
                "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"400\" height=\"200\"><circle cx=\"5\" cy=\"5\" r=\"3\"/></svg>"
            ]
        );
    }

    #[test]
    fn test_matching_is_case_insensitive_and_spans_lines() {
        let text = "<SVG width=\"10\">\n  <rect/>\n</SVG>";
        let blocks = extract_svg_blocks([text]);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].starts_with("<SVG"));
    }

    #[test]
    fn test_dedupes_preserving_first_seen_order() {
        let first = "<svg id=\"a\"><rect/></svg>";
        let second = "<svg id=\"b\"><circle/></svg>";
        let texts = [
            format!("concept A: {first}"),
            format!("repeating: {first} and also {second}"),
        ];
        let blocks = extract_svg_blocks(texts.iter().map(String::as_str));
        assert_eq!(blocks, vec![first, second]);
    }

    #[test]
    fn test_fenced_element_payload_not_double_counted() {
        let text = "```svg\n<svg><rect/></svg>\n```";
        let blocks = extract_svg_blocks([text]);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_no_artifact_in_plain_text() {
        let texts = ["I like the second concept.", "", "Let's refine the palette."];
        assert!(extract_svg_blocks(texts).is_empty());
        assert!(!contains_svg(texts));
    }

    #[test]
    fn test_multiple_texts_scanned_in_order() {
        let texts = [
            "no artifact here",
            "<svg id=\"1\"/></svg>",
            "<svg id=\"2\"/></svg>",
        ];
        let blocks = extract_svg_blocks(texts);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("id=\"1\""));
        assert!(blocks[1].contains("id=\"2\""));
    }
}

//! Escape normalisation: `\<` → `&lt;`, `\>` → `&gt;` before Markdown parsing.
//!
//! Prose such as "primitives are strictly defined (e.g., \<View\>)" uses a
//! backslash to keep a tag-like token visible. Left alone, one layer of
//! escaping is consumed during conversion and the bare `<View>` that
//! remains is swallowed by the browser as an unknown element, leaving a blank
//! gap in the PDF. Rewriting the two sequences to entities up front makes the
//! browser print the brackets.
//!
//! Only the two literal backslash-prefixed forms are touched, so existing
//! entities (`&lt;`, `&amp;`) are never double-escaped and text without
//! those sequences passes through unchanged.
//!
//! ## Scope
//!
//! With [`EscapeScope::Prose`] the rewrite skips code blocks and inline code
//! spans, where a backslash is content and an entity would be printed
//! verbatim. Code blocks are located by parsing the text with the same
//! options the renderer uses, so fences nested in list items or block quotes
//! and indented code blocks are found too. Inline spans are matched within a
//! single line. [`EscapeScope::Everywhere`] rewrites the whole string.

use crate::config::EscapeScope;
use crate::pipeline::compose::markdown_options;
use comrak::nodes::NodeValue;
use comrak::{parse_document, Arena};
use std::ops::RangeInclusive;

const ESCAPED_LT: &str = "\\<";
const ESCAPED_GT: &str = "\\>";

/// Rewrite backslash-escaped angle brackets to HTML entities.
pub fn normalize_escapes(text: &str, scope: EscapeScope) -> String {
    match scope {
        EscapeScope::Everywhere => replace_escapes(text),
        EscapeScope::Prose => normalize_prose(text),
    }
}

/// `true` if `text` contains anything [`normalize_escapes`] could rewrite.
pub fn has_escapes(text: &str) -> bool {
    text.contains(ESCAPED_LT) || text.contains(ESCAPED_GT)
}

fn replace_escapes(text: &str) -> String {
    if !has_escapes(text) {
        return text.to_string();
    }
    text.replace(ESCAPED_LT, "&lt;").replace(ESCAPED_GT, "&gt;")
}

// ── Code blocks ──────────────────────────────────────────────────────────────

/// 1-based source line ranges of every code block, fenced or indented.
fn code_block_lines(text: &str) -> Vec<RangeInclusive<usize>> {
    let arena = Arena::new();
    let root = parse_document(&arena, text, &markdown_options());

    root.descendants()
        .filter_map(|node| {
            let data = node.data.borrow();
            match data.value {
                NodeValue::CodeBlock(_) => {
                    Some(data.sourcepos.start.line..=data.sourcepos.end.line)
                }
                _ => None,
            }
        })
        .collect()
}

/// Split after each `\n`, `\r\n` or lone `\r`, the line endings the parser counts.
fn source_lines(text: &str) -> impl Iterator<Item = &str> + '_ {
    let bytes = text.as_bytes();
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= bytes.len() {
            return None;
        }
        let mut end = start;
        while end < bytes.len() {
            let b = bytes[end];
            end += 1;
            if b == b'\n' {
                break;
            }
            if b == b'\r' {
                if bytes.get(end) == Some(&b'\n') {
                    end += 1;
                }
                break;
            }
        }
        let line = &text[start..end];
        start = end;
        Some(line)
    })
}

fn normalize_prose(text: &str) -> String {
    if !has_escapes(text) {
        return text.to_string();
    }

    let code = code_block_lines(text);
    let mut out = String::with_capacity(text.len() + 16);

    for (index, line) in source_lines(text).enumerate() {
        let number = index + 1;
        if code.iter().any(|lines| lines.contains(&number)) {
            out.push_str(line);
        } else {
            out.push_str(&normalize_line(line));
        }
    }

    out
}

// ── Inline code spans ────────────────────────────────────────────────────────

fn normalize_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find('`') {
        let (before, from_tick) = rest.split_at(start);
        out.push_str(&replace_escapes(before));

        let run = from_tick.bytes().take_while(|&b| b == b'`').count();
        let after_open = &from_tick[run..];
        match closing_run_end(after_open, run) {
            Some(end) => {
                out.push_str(&from_tick[..run + end]);
                rest = &after_open[end..];
            }
            None => {
                out.push_str(&from_tick[..run]);
                rest = after_open;
            }
        }
    }

    out.push_str(&replace_escapes(rest));
    out
}

/// Byte offset just past the first backtick run of exactly `len` in `s`.
fn closing_run_end(s: &str, len: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let start = i;
            while i < bytes.len() && bytes[i] == b'`' {
                i += 1;
            }
            if i - start == len {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: [EscapeScope; 2] = [EscapeScope::Prose, EscapeScope::Everywhere];

    #[test]
    fn identity_without_escapes() {
        let inputs = [
            "",
            "plain text",
            "<b>raw html</b> & &lt;entity&gt;",
            "```rust\nlet x = a < b;\n```\n",
            "a backslash \\ alone and \\n",
        ];
        for scope in BOTH {
            for input in inputs {
                assert_eq!(normalize_escapes(input, scope), input, "{scope:?}: {input:?}");
            }
        }
    }

    #[test]
    fn escaped_tag_becomes_entities() {
        for scope in BOTH {
            assert_eq!(normalize_escapes(r"\<Foo\>", scope), "&lt;Foo&gt;");
        }
    }

    #[test]
    fn prose_sentence_with_several_tags() {
        let input = r"primitives are strictly defined (e.g., \<View\>, \<Text\>, \<Image\>).";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Prose),
            "primitives are strictly defined (e.g., &lt;View&gt;, &lt;Text&gt;, &lt;Image&gt;)."
        );
    }

    #[test]
    fn existing_entities_not_double_escaped() {
        let input = r"&lt;kept&gt; and \<new\>";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Everywhere),
            "&lt;kept&gt; and &lt;new&gt;"
        );
    }

    #[test]
    fn order_independent() {
        // A lone `\>` before any `\<` is handled the same way.
        assert_eq!(normalize_escapes(r"\> then \<", EscapeScope::Prose), "&gt; then &lt;");
    }

    #[test]
    fn fenced_code_preserved_in_prose_scope() {
        let input = "Use \\<T\\>:\n\n```rust\nfn f\\<T\\>() {}\n```\n\nAfter \\<U\\>\n";
        let expected = "Use &lt;T&gt;:\n\n```rust\nfn f\\<T\\>() {}\n```\n\nAfter &lt;U&gt;\n";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), expected);
    }

    #[test]
    fn fenced_code_rewritten_in_everywhere_scope() {
        let input = "```\n\\<T\\>\n```\n";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Everywhere),
            "```\n&lt;T&gt;\n```\n"
        );
    }

    #[test]
    fn tilde_fence_and_longer_closer() {
        let input = "~~~~\n\\<a\\>\n~~~\nstill code \\<b\\>\n~~~~~\n\\<c\\>";
        let expected = "~~~~\n\\<a\\>\n~~~\nstill code \\<b\\>\n~~~~~\n&lt;c&gt;";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), expected);
    }

    #[test]
    fn mismatched_marker_does_not_close() {
        let input = "```\n~~~\n\\<x\\>\n```\n\\<y\\>";
        let expected = "```\n~~~\n\\<x\\>\n```\n&lt;y&gt;";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), expected);
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let input = "```\n\\<x\\>\n";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), input);
    }

    #[test]
    fn inline_code_span_preserved() {
        let input = "write `\\<br\\>` to get \\<br\\>";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Prose),
            "write `\\<br\\>` to get &lt;br&gt;"
        );
    }

    #[test]
    fn double_backtick_span_preserved() {
        let input = "``a ` \\<b\\>`` \\<c\\>";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Prose),
            "``a ` \\<b\\>`` &lt;c&gt;"
        );
    }

    #[test]
    fn unmatched_backtick_is_prose() {
        let input = "a ` b \\<c\\>";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), "a ` b &lt;c&gt;");
    }

    #[test]
    fn triple_backticks_inline_is_not_a_fence() {
        let input = "```x``` \\<y\\>\n\\<z\\>";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Prose),
            "```x``` &lt;y&gt;\n&lt;z&gt;"
        );
    }

    #[test]
    fn crlf_lines_keep_fence_tracking() {
        let input = "```\r\n\\<x\\>\r\n```\r\n\\<y\\>\r\n";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Prose),
            "```\r\n\\<x\\>\r\n```\r\n&lt;y&gt;\r\n"
        );
    }

    #[test]
    fn lone_cr_lines_keep_fence_tracking() {
        let input = "```\r\\<x\\>\r```\r\\<y\\>";
        assert_eq!(
            normalize_escapes(input, EscapeScope::Prose),
            "```\r\\<x\\>\r```\r&lt;y&gt;"
        );
    }

    #[test]
    fn fence_inside_list_item_preserved() {
        let input = "- item \\<a\\>\n\n  ```\n  let v: Vec\\<u8\\>;\n  ```\n\nAfter \\<b\\>\n";
        let expected = "- item &lt;a&gt;\n\n  ```\n  let v: Vec\\<u8\\>;\n  ```\n\nAfter &lt;b&gt;\n";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), expected);
    }

    #[test]
    fn fence_inside_block_quote_preserved() {
        let input = "> ```\n> a \\<T\\> b\n> ```\n\n\\<U\\>\n";
        let expected = "> ```\n> a \\<T\\> b\n> ```\n\n&lt;U&gt;\n";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), expected);
    }

    #[test]
    fn indented_code_block_preserved() {
        let input = "Text \\<a\\>\n\n    fn f\\<T\\>() {}\n\nMore \\<b\\>\n";
        let expected = "Text &lt;a&gt;\n\n    fn f\\<T\\>() {}\n\nMore &lt;b&gt;\n";
        assert_eq!(normalize_escapes(input, EscapeScope::Prose), expected);
    }

    #[test]
    fn nested_code_renders_without_double_escaping() {
        let input = "- item\n\n  ```\n  a \\<T\\> b\n  ```\n\n> ```\n> c \\<U\\> d\n> ```\n";
        let normalized = normalize_escapes(input, EscapeScope::Prose);
        let html = crate::pipeline::compose::markdown_renderer()
            .to_html(&normalized)
            .unwrap();
        assert!(!html.contains("&amp;lt;"), "got: {html}");
        assert!(html.contains("&lt;T"), "got: {html}");
        assert!(html.contains("&lt;U"), "got: {html}");
    }

    #[test]
    fn has_escapes_detects_either_form() {
        assert!(has_escapes(r"\<"));
        assert!(has_escapes(r"\>"));
        assert!(!has_escapes("<>"));
    }
}

//! HTML composition: Markdown → HTML fragment → complete document.
//!
//! ## Trusted-input contract
//!
//! The fragment produced by [`MarkdownRenderer`] and the stylesheet text are
//! interpolated into the document **without sanitisation**. Raw HTML in the
//! Markdown source passes straight through, and so does anything in the CSS.
//! That is acceptable for a local, single-user conversion tool whose input
//! is the user's own files; it is not acceptable for a service that accepts
//! documents from others. Only the title and language, which this crate
//! produces, are escaped.
//!
//! ## Markdown features
//!
//! - fenced code blocks, highlighted by syntect into `syntax-` prefixed
//!   classes (style them from the stylesheet)
//! - GFM tables, strikethrough, autolinks, task lists, footnotes
//! - Markdown inside raw HTML blocks whose opening tag carries
//!   `markdown="1"` (or `"block"` / `"span"`)

use crate::error::Md2PdfError;
use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use comrak::{format_html, parse_document, Arena, Options};
use once_cell::sync::Lazy;
use regex::Regex;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Title and language of the composed document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentMeta<'a> {
    pub title: &'a str,
    pub lang: &'a str,
}

/// Wrap an HTML fragment in the fixed document skeleton.
///
/// `stylesheet` is placed verbatim inside `<style>`; `None` leaves the block
/// empty. The fragment is placed verbatim inside `<body>`.
pub fn compose_document(fragment: &str, stylesheet: Option<&str>, meta: &DocumentMeta<'_>) -> String {
    let css = stylesheet.unwrap_or("");
    format!(
        "<!DOCTYPE html>\n\
<html lang=\"{lang}\">\n\
<head>\n\
<meta charset=\"UTF-8\">\n\
<title>{title}</title>\n\
<style>\n\
{css}\n\
</style>\n\
</head>\n\
<body>\n\
{fragment}\n\
</body>\n\
</html>\n",
        lang = escape_html(meta.lang),
        title = escape_html(meta.title),
    )
}

/// Escape text for element content and double-quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = comrak::html::escape(&mut out, text);
    out
}

// ── Markdown renderer ────────────────────────────────────────────────────────

/// Parser and renderer options shared by rendering and escape normalisation,
/// so both agree on where code blocks are.
pub(crate) fn markdown_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.tagfilter = false;

    let render = &mut options.render;
    // Raw HTML and the highlighted blocks below are emitted as HTML blocks.
    render.r#unsafe = true;

    options
}

static RENDERER: Lazy<MarkdownRenderer> = Lazy::new(MarkdownRenderer::new);

/// Shared renderer, built on first use (loading the syntax set is not free).
pub fn markdown_renderer() -> &'static MarkdownRenderer {
    &RENDERER
}

/// comrak parser + syntect highlighter with the extension set this tool uses.
pub struct MarkdownRenderer {
    options: Options<'static>,
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            options: markdown_options(),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        }
    }

    /// Convert Markdown to an HTML fragment.
    pub fn to_html(&self, markdown: &str) -> Result<String, Md2PdfError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        self.visit_nodes(root)?;

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| Md2PdfError::Markdown {
            message: err.to_string(),
        })?;
        Ok(html)
    }

    fn visit_nodes(&self, node: &AstNode<'_>) -> Result<(), Md2PdfError> {
        if let Some((info, literal)) = extract_code_block(node) {
            let html = self.highlight_code(&info, &literal)?;
            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: html,
            });
        } else if let Some(literal) = extract_html_block(node) {
            if let Some(html) = self.expand_markdown_in_html(&literal)? {
                let mut data = node.data.borrow_mut();
                data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                    block_type: 0,
                    literal: html,
                });
            }
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.visit_nodes(next)?;
            child = next.next_sibling();
        }

        Ok(())
    }

    fn highlight_code(&self, info: &str, code: &str) -> Result<String, Md2PdfError> {
        let lang_token = info
            .split_whitespace()
            .next()
            .map(sanitize_token)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string());

        let syntax = self
            .find_syntax(&lang_token)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let mut code_with_newline = code.to_string();
        if !code_with_newline.ends_with('\n') {
            code_with_newline.push('\n');
        }

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, self.class_style);
        for line in LinesWithEndings::from(code_with_newline.as_str()) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|err| Md2PdfError::Highlighting {
                    language: lang_token.clone(),
                    message: err.to_string(),
                })?;
        }
        let highlighted = generator.finalize();

        Ok(format!(
            "<pre class=\"syntax-highlight syntax-lang-{lang}\"><code class=\"language-{lang} syntax-code\">{highlighted}</code></pre>\n",
            lang = lang_token,
        ))
    }

    fn find_syntax(&self, token: &str) -> Option<&SyntaxReference> {
        self.syntax_set
            .find_syntax_by_token(token)
            .or_else(|| self.syntax_set.find_syntax_by_name(token))
            .or_else(|| self.syntax_set.find_syntax_by_extension(token))
    }

    /// Render the inside of a `markdown="1"` HTML block as Markdown.
    ///
    /// Returns `None` when the block carries no such attribute.
    fn expand_markdown_in_html(&self, literal: &str) -> Result<Option<String>, Md2PdfError> {
        if let Some(caps) = RE_MARKDOWN_BLOCK.captures(literal) {
            let open = &caps[1];
            let close = &caps[5];
            if open.eq_ignore_ascii_case(close) {
                let inner = self.to_html(&caps[4])?;
                return Ok(Some(format!(
                    "<{open}{}{}>\n{inner}</{close}>\n",
                    &caps[2], &caps[3]
                )));
            }
        }

        // Opening tag without its close: comrak ended the block at the first
        // blank line, and later blocks are parsed as Markdown already. The
        // text after the opening tag still belongs to the element.
        if let Some(m) = RE_MARKDOWN_ATTR.find(literal) {
            if !literal[..m.start()].contains('>') {
                if let Some(offset) = literal[m.end()..].find('>') {
                    let tag_end = m.end() + offset + 1;
                    let open_tag = format!("{}{}", &literal[..m.start()], &literal[m.end()..tag_end]);
                    let rest = &literal[tag_end..];
                    if rest.trim().is_empty() {
                        return Ok(Some(format!("{open_tag}{rest}")));
                    }
                    let inner = self.to_html(rest)?;
                    return Ok(Some(format!("{open_tag}\n{inner}")));
                }
            }
        }

        Ok(None)
    }
}

static RE_MARKDOWN_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)\A\s*<([A-Za-z][A-Za-z0-9-]*)([^>]*?)\s+markdown\s*=\s*(?:"(?:1|block|span)"|'(?:1|block|span)'|1)([^>]*)>(.*)</([A-Za-z][A-Za-z0-9-]*)\s*>\s*\z"#,
    )
    .unwrap()
});

static RE_MARKDOWN_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s+markdown\s*=\s*(?:"(?:1|block|span)"|'(?:1|block|span)'|1)"#).unwrap()
});

/// Keep only characters that are safe inside a class attribute.
fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '-' | '_' | '.'))
        .collect::<String>()
        .to_ascii_lowercase()
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}

fn extract_html_block(node: &AstNode<'_>) -> Option<String> {
    let data = node.data.borrow();
    if let NodeValue::HtmlBlock(block) = &data.value {
        Some(block.literal.clone())
    } else {
        None
    }
}

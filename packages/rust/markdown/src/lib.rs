//! Markdown-to-HTML conversion and the HTML passes that follow it.
//!
//! Converts lesson Markdown to HTML with `pulldown-cmark` (fenced code
//! highlighted with `syntect`), then rewrites the flat `<h1>`–`<h4>` headings
//! into numbered sections and nested boxes, and wraps tables in a scroll
//! container.

mod headings;
mod highlight;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use tracing::{debug, instrument, warn};

pub use headings::{
    BoxKind, BoxVocabulary, HeadingRank, MarkupEvent, RestructureStats, Restructured,
    restructure, split_annotation, tokenize,
};
pub use highlight::CodeHighlighter;

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Per-build knobs for [`markdown_to_html`].
#[derive(Clone, Copy, Default)]
pub struct ConvertOptions<'a> {
    /// Highlights fenced and indented code blocks; `None` keeps plain
    /// `<pre><code>` output.
    pub highlighter: Option<&'a CodeHighlighter>,
    /// Marker standing in for a source `\$`; written back as `\$` inside code.
    pub escaped_dollar: Option<&'a str>,
}

impl ConvertOptions<'_> {
    fn code_text(&self, text: &str) -> String {
        match self.escaped_dollar {
            Some(marker) => text.replace(marker, r"\$"),
            None => text.to_string(),
        }
    }
}

/// Convert Markdown to an HTML fragment.
///
/// Tables and strikethrough are enabled. Headings come out as bare
/// `<hN>…</hN>` tags without ids, which is what [`restructure`] expects.
#[instrument(skip_all, fields(len = markdown.len()))]
pub fn markdown_to_html(markdown: &str, options: &ConvertOptions<'_>) -> String {
    use pulldown_cmark::{Options, Parser, html};

    let mut parser_options = Options::empty();
    parser_options.insert(Options::ENABLE_TABLES);
    parser_options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, parser_options);
    let events = rewrite_code(parser, options);

    let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut out, events.into_iter());

    debug!(html_len = out.len(), "markdown conversion complete");
    out
}

/// Buffer each code block so it can be highlighted as a whole, and put
/// escaped dollars back inside code spans and blocks.
fn rewrite_code<'a>(
    events: impl Iterator<Item = Event<'a>>,
    options: &ConvertOptions<'_>,
) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    let mut block: Option<(CodeBlockKind<'a>, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => block = Some((kind, String::new())),
            Event::Text(text) => match block.as_mut() {
                Some((_, code)) => code.push_str(&text),
                None => out.push(Event::Text(text)),
            },
            Event::End(TagEnd::CodeBlock) => {
                if let Some((kind, code)) = block.take() {
                    out.extend(code_block(kind, options.code_text(&code), options.highlighter));
                }
            }
            Event::Code(text) => out.push(Event::Code(CowStr::from(options.code_text(&text)))),
            other => out.push(other),
        }
    }
    out
}

fn code_block<'a>(
    kind: CodeBlockKind<'a>,
    code: String,
    highlighter: Option<&CodeHighlighter>,
) -> Vec<Event<'a>> {
    if let Some(highlighter) = highlighter {
        let language = match &kind {
            CodeBlockKind::Fenced(info) => info.split_whitespace().next(),
            CodeBlockKind::Indented => None,
        };
        match highlighter.highlight(&code, language) {
            Ok(markup) => return vec![Event::Html(CowStr::from(markup))],
            Err(e) => warn!(error = %e, "code highlighting failed, keeping plain block"),
        }
    }

    vec![
        Event::Start(Tag::CodeBlock(kind)),
        Event::Text(CowStr::from(code)),
        Event::End(TagEnd::CodeBlock),
    ]
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Wrap every `<table>` in `<div class="table-container">` so wide tables scroll.
pub fn wrap_tables(html: &str) -> String {
    html.replace("<table>", r#"<div class="table-container"><table>"#)
        .replace("</table>", "</table></div>")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> ConvertOptions<'static> {
        ConvertOptions::default()
    }

    #[test]
    fn headings_have_no_ids() {
        let html = markdown_to_html("# Intro\n\n## Part\n\n### Définition\n\n#### Cas\n", &plain());
        assert!(html.contains("<h1>Intro</h1>"));
        assert!(html.contains("<h2>Part</h2>"));
        assert!(html.contains("<h3>Définition</h3>"));
        assert!(html.contains("<h4>Cas</h4>"));
    }

    #[test]
    fn placeholder_tokens_pass_through() {
        let token = "MATH0190a1b2c3d4e5f60718293a4b5c6d7eN12X";
        let html = markdown_to_html(&format!("Let {token} be given.\n\n### Lemme ({token})\n"), &plain());
        assert_eq!(html.matches(token).count(), 2);
    }

    #[test]
    fn escaped_dollar_marker_is_restored_in_code_only() {
        let marker = "MATH0190a1b2c3d4e5f60718293a4b5c6d7eDX";
        let source = format!(
            "Costs {marker}5.\n\nRun `echo {marker}HOME` now.\n\n```sh\nprice={marker}5\n```\n"
        );
        let options = ConvertOptions {
            escaped_dollar: Some(marker),
            ..ConvertOptions::default()
        };
        let html = markdown_to_html(&source, &options);

        assert!(html.contains(&format!("<p>Costs {marker}5.</p>")));
        assert!(html.contains(r"<code>echo \$HOME</code>"));
        assert!(html.contains(r#"<pre><code class="language-sh">price=\$5"#));
    }

    #[test]
    fn fenced_code_is_highlighted() {
        let highlighter = CodeHighlighter::new("base16-ocean.light").unwrap();
        let options = ConvertOptions {
            highlighter: Some(&highlighter),
            ..ConvertOptions::default()
        };
        let html = markdown_to_html(
            "Avant\n\n```rust\nlet v: Vec<u8> = vec![];\n```\n\nAprès `inline`\n",
            &options,
        );

        assert!(html.contains("<pre style=\""));
        assert!(html.contains("<span style=\""));
        assert!(html.contains("&lt;"));
        assert!(!html.contains("language-rust"));
        assert!(!html.contains("Vec<u8>"));
        assert!(html.contains("<p>Avant</p>"));
        assert!(html.contains("<code>inline</code>"));
    }

    #[test]
    fn code_blocks_without_highlighter_stay_plain() {
        let html = markdown_to_html("```py\nx = 1 < 2\n```\n\n    indented\n", &plain());
        assert!(html.contains("<pre><code class=\"language-py\">x = 1 &lt; 2\n</code></pre>"));
        assert!(html.contains("<pre><code>indented\n</code></pre>"));
    }

    #[test]
    fn highlighted_code_keeps_placeholder_tokens() {
        let token = "MATH0190a1b2c3d4e5f60718293a4b5c6d7eN3X";
        let highlighter = CodeHighlighter::new("base16-ocean.light").unwrap();
        let options = ConvertOptions {
            highlighter: Some(&highlighter),
            ..ConvertOptions::default()
        };
        let html = markdown_to_html(&format!("```\nvalue {token}\n```\n"), &options);
        assert!(html.contains(token));
    }

    #[test]
    fn tables_are_converted() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n", &plain());
        assert!(html.contains("<table>"));
        assert!(html.contains("</table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn wrap_tables_adds_container() {
        let html = "<p>x</p><table><tr><td>1</td></tr></table><table></table>";
        let wrapped = wrap_tables(html);
        assert_eq!(
            wrapped,
            "<p>x</p><div class=\"table-container\"><table><tr><td>1</td></tr></table></div>\
             <div class=\"table-container\"><table></table></div>"
        );
    }

    #[test]
    fn wrap_tables_without_tables_is_identity() {
        assert_eq!(wrap_tables("<p>none</p>"), "<p>none</p>");
    }
}

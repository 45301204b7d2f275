//! Math span extraction.
//!
//! Block spans (`$$…$$`) are all consumed before inline spans (`$…$`), each
//! leftmost-first, so token numbering is reproducible. Every span is
//! rendered, wrapped in a `<span class="math-block|math-inline">`, and its
//! place in the text is taken by a [`PlaceholderToken`](crate::PlaceholderToken).

use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use lessonbuild_shared::MathSettings;

use crate::placeholder::{PlaceholderTable, TokenMint};
use crate::render::{MathMode, MathRenderer, expand_macros};

/// Source spelling of a literal dollar sign.
const ESCAPED_DOLLAR: &str = r"\$";

/// Counters reported for one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub block_spans: usize,
    pub inline_spans: usize,
    pub render_failures: usize,
    /// Delimiter kinds whose scan stopped on an unclosed opener.
    pub malformed: usize,
}

/// Output of [`MathExtractor::extract`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Source text with every math span replaced by its token.
    pub text: String,
    pub table: PlaceholderTable,
    /// Marker that replaced every `\$` outside math spans.
    pub escaped_dollar: String,
    pub stats: ExtractStats,
}

/// Finds, renders and replaces math spans.
pub struct MathExtractor<R> {
    renderer: R,
    settings: MathSettings,
}

struct ScanState {
    mint: TokenMint,
    escaped_dollar: String,
    table: PlaceholderTable,
    stats: ExtractStats,
}

impl<R: MathRenderer> MathExtractor<R> {
    pub fn new(renderer: R, settings: MathSettings) -> Self {
        Self { renderer, settings }
    }

    /// Replace every math span in `text` with a placeholder.
    ///
    /// Never fails: unclosed delimiters stop the scan for that kind and
    /// render errors fall back to the raw TeX.
    #[instrument(skip_all, fields(len = text.len()))]
    pub async fn extract(&self, text: &str) -> Extraction {
        let mint = TokenMint::for_text(text);
        let mut state = ScanState {
            escaped_dollar: mint.escaped_dollar(),
            mint,
            table: PlaceholderTable::default(),
            stats: ExtractStats::default(),
        };

        let escaped = text.replace(ESCAPED_DOLLAR, &state.escaped_dollar);
        let text = self.extract_spans(&escaped, MathMode::Block, &mut state).await;
        let text = self.extract_spans(&text, MathMode::Inline, &mut state).await;

        debug!(
            block = state.stats.block_spans,
            inline = state.stats.inline_spans,
            failures = state.stats.render_failures,
            "math extraction complete"
        );

        Extraction {
            text,
            table: state.table,
            escaped_dollar: state.escaped_dollar,
            stats: state.stats,
        }
    }

    async fn extract_spans(&self, text: &str, mode: MathMode, state: &mut ScanState) -> String {
        let delimiter = mode.delimiter();
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find(delimiter) {
            let body_start = open + delimiter.len();
            let Some(body_len) = rest[body_start..].find(delimiter) else {
                let offset = text.len() - rest.len() + open;
                error!(mode = mode.as_str(), offset, "unmatched math delimiter");
                state.stats.malformed += 1;
                break;
            };

            let tex = &rest[body_start..body_start + body_len];
            let rendered = self
                .render_span(tex, mode, &state.escaped_dollar, &mut state.stats)
                .await;
            let token = state.mint.next_token();

            out.push_str(&rest[..open]);
            out.push_str(token.as_str());
            state.table.insert(token, rendered);

            match mode {
                MathMode::Block => state.stats.block_spans += 1,
                MathMode::Inline => state.stats.inline_spans += 1,
            }
            rest = &rest[body_start + body_len + delimiter.len()..];
        }

        out.push_str(rest);
        out
    }

    async fn render_span(
        &self,
        tex: &str,
        mode: MathMode,
        escaped_dollar: &str,
        stats: &mut ExtractStats,
    ) -> String {
        // Inside math, an escaped dollar is TeX again.
        let tex = tex.replace(escaped_dollar, ESCAPED_DOLLAR);
        let expanded = expand_macros(&tex, &self.settings.macros);

        let body = match self.renderer.render(&expanded, mode).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!(error = %e, tex = %tex, "math render failed, keeping raw TeX");
                stats.render_failures += 1;
                escape_angle_brackets(&tex)
            }
        };

        format!("<span class=\"{}\">{body}</span>", mode.css_class())
    }
}

/// Raw TeX is shown as text; `<` in `a<b` must not open a tag.
fn escape_angle_brackets(tex: &str) -> String {
    tex.replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lessonbuild_shared::{LessonError, Result};

    use super::*;
    use crate::placeholder::{resolve, restore_escaped_dollars};

    /// Wraps the TeX in a fake `<svg>` so tests can see what was rendered.
    struct SvgStub;

    impl MathRenderer for SvgStub {
        async fn render(&self, tex: &str, _mode: MathMode) -> Result<String> {
            Ok(format!("<svg>{tex}</svg>"))
        }
    }

    struct FailingRenderer;

    impl MathRenderer for FailingRenderer {
        async fn render(&self, _tex: &str, _mode: MathMode) -> Result<String> {
            Err(LessonError::Render("renderer offline".into()))
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        seen: Mutex<Vec<(String, MathMode)>>,
    }

    impl MathRenderer for RecordingRenderer {
        async fn render(&self, tex: &str, mode: MathMode) -> Result<String> {
            self.seen.lock().unwrap().push((tex.to_string(), mode));
            Ok(String::from("<b>$</b>"))
        }
    }

    fn extractor<R: MathRenderer>(renderer: R) -> MathExtractor<R> {
        MathExtractor::new(renderer, MathSettings::default())
    }

    #[tokio::test]
    async fn single_block_span() {
        let out = extractor(SvgStub).extract("$$x^2$$").await;

        assert_eq!(out.table.len(), 1);
        let (token, rendered) = out.table.iter().next().unwrap();
        assert_eq!(out.text, token.as_str());
        assert_eq!(rendered, "<span class=\"math-block\"><svg>x^2</svg></span>");
        assert_eq!(
            resolve(&out.text, &out.table),
            "<span class=\"math-block\"><svg>x^2</svg></span>"
        );
    }

    #[tokio::test]
    async fn render_failure_keeps_raw_tex() {
        let out = extractor(FailingRenderer).extract("$$x^2$$ and $a<b$").await;

        assert_eq!(out.stats.render_failures, 2);
        let resolved = resolve(&out.text, &out.table);
        assert_eq!(
            resolved,
            "<span class=\"math-block\">x^2</span> and <span class=\"math-inline\">a&lt;b</span>"
        );
    }

    #[tokio::test]
    async fn blocks_are_numbered_before_inlines() {
        let renderer = RecordingRenderer::default();
        let ex = extractor(renderer);
        let out = ex.extract("a $x$ b $$y$$ c $z$").await;

        let seen = ex.renderer.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("y".to_string(), MathMode::Block),
                ("x".to_string(), MathMode::Inline),
                ("z".to_string(), MathMode::Inline),
            ]
        );

        let tokens: Vec<_> = out.table.iter().map(|(t, _)| t.to_string()).collect();
        assert!(tokens[0].ends_with("N1X"));
        assert_eq!(
            out.text,
            format!("a {} b {} c {}", tokens[1], tokens[0], tokens[2])
        );
        assert_eq!(out.stats.block_spans, 1);
        assert_eq!(out.stats.inline_spans, 2);
    }

    #[tokio::test]
    async fn rendered_output_is_not_rescanned() {
        // The recording renderer returns markup containing a `$`.
        let out = extractor(RecordingRenderer::default())
            .extract("$$x$$ then $y$")
            .await;

        assert_eq!(out.stats.block_spans, 1);
        assert_eq!(out.stats.inline_spans, 1);
        assert_eq!(out.stats.malformed, 0);
        assert!(!out.text.contains('$'));
    }

    #[tokio::test]
    async fn escaped_dollar_stays_literal() {
        let out = extractor(SvgStub).extract(r"It costs \$5, not $x$.").await;

        assert_eq!(out.stats.inline_spans, 1);
        assert!(!out.text.contains('$'));
        assert!(
            out.text
                .starts_with(&format!("It costs {}5, not ", out.escaped_dollar))
        );
        let resolved = resolve(&out.text, &out.table);
        let restored = restore_escaped_dollars(&resolved, &out.escaped_dollar);
        assert!(restored.starts_with("It costs $5, not "));
        assert!(restored.contains("<svg>x</svg>"));
    }

    #[tokio::test]
    async fn escaped_dollar_marker_is_alphanumeric() {
        let out = extractor(SvgStub).extract(r"`echo \$HOME`").await;

        assert_eq!(out.text, format!("`echo {}HOME`", out.escaped_dollar));
        assert!(out.escaped_dollar.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(!r"`echo \$HOME`".contains(&out.escaped_dollar));
    }

    #[tokio::test]
    async fn escaped_dollar_inside_math_is_tex_again() {
        let ex = extractor(RecordingRenderer::default());
        ex.extract(r"$$\$ 10$$").await;

        let seen = ex.renderer.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(r"\$ 10".to_string(), MathMode::Block)]);
    }

    #[tokio::test]
    async fn unmatched_inline_stops_scan() {
        let out = extractor(SvgStub).extract("$a$ then $b and more").await;

        assert_eq!(out.stats.inline_spans, 1);
        assert_eq!(out.stats.malformed, 1);
        assert!(out.text.ends_with(" then $b and more"));
    }

    #[tokio::test]
    async fn unmatched_block_keeps_earlier_spans() {
        let out = extractor(SvgStub).extract("$$a$$ then $$b").await;

        assert_eq!(out.stats.block_spans, 1);
        assert_eq!(out.stats.malformed, 1);
        // The leftover `$$` is read as an empty inline span.
        assert_eq!(out.stats.inline_spans, 1);
        assert!(out.text.ends_with('b'));
    }

    #[tokio::test]
    async fn macros_are_expanded_before_rendering() {
        let ex = extractor(RecordingRenderer::default());
        ex.extract(r"$\llbracket 1, n \rrbracket$").await;

        let seen = ex.renderer.seen.lock().unwrap().clone();
        assert_eq!(seen[0].0, r"\left[ 1, n \right] \cap \mathbb{Z}");
    }

    #[tokio::test]
    async fn tokens_never_occur_in_source() {
        let source = "MATH is fun: $$a$$, $b$ and MATHN1X.";
        let out = extractor(SvgStub).extract(source).await;

        assert_eq!(out.table.len(), 2);
        for (token, _) in out.table.iter() {
            assert!(!source.contains(token.as_str()));
            assert!(out.text.contains(token.as_str()));
        }
    }

    #[tokio::test]
    async fn text_without_math_is_unchanged() {
        let out = extractor(SvgStub).extract("# Title\n\nNo math here.\n").await;
        assert!(out.table.is_empty());
        assert_eq!(out.text, "# Title\n\nNo math here.\n");
        assert_eq!(out.stats, ExtractStats::default());
    }
}

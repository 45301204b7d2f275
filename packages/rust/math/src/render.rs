//! TeX rendering backends.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use lessonbuild_shared::{LessonError, Result};

/// Block (`$$…$$`) or inline (`$…$`) math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathMode {
    Block,
    Inline,
}

impl MathMode {
    /// Source delimiter for this kind of span.
    pub fn delimiter(&self) -> &'static str {
        match self {
            Self::Block => "$$",
            Self::Inline => "$",
        }
    }

    /// Class of the `<span>` wrapping the rendered output.
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Block => "math-block",
            Self::Inline => "math-inline",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Inline => "inline",
        }
    }
}

/// Turns one TeX string into embeddable markup.
///
/// Failures are per-span: the extractor logs them and falls back to the raw TeX.
pub trait MathRenderer: Send + Sync {
    fn render(&self, tex: &str, mode: MathMode) -> impl Future<Output = Result<String>> + Send;
}

/// Renders TeX to MathML with `latex2mathml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathMlRenderer;

impl MathRenderer for MathMlRenderer {
    async fn render(&self, tex: &str, mode: MathMode) -> Result<String> {
        let style = match mode {
            MathMode::Block => latex2mathml::DisplayStyle::Block,
            MathMode::Inline => latex2mathml::DisplayStyle::Inline,
        };
        latex2mathml::latex_to_mathml(tex, style).map_err(|e| LessonError::Render(e.to_string()))
    }
}

/// Expand user macros (`\name` → replacement) in one pass.
///
/// A command name is the longest run of ASCII letters after the backslash,
/// so `\Rset` is not touched by a macro named `R`. Replacements are not
/// re-expanded.
pub fn expand_macros(tex: &str, macros: &BTreeMap<String, String>) -> String {
    static COMMAND_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\\([A-Za-z]+)").expect("valid regex"));

    if macros.is_empty() {
        return tex.to_string();
    }

    COMMAND_RE
        .replace_all(tex, |caps: &Captures<'_>| match macros.get(&caps[1]) {
            Some(expansion) => expansion.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

//! Fenced code highlighting with `syntect`.

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use tracing::debug;

use lessonbuild_shared::{CodeSettings, LessonError, Result};

/// Syntax set and theme loaded once per build.
pub struct CodeHighlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl CodeHighlighter {
    /// Load the bundled syntaxes and the named bundled theme.
    pub fn new(theme_name: &str) -> Result<Self> {
        let syntaxes = SyntaxSet::load_defaults_newlines();
        // `remove` hands back an owned `Theme`.
        let theme = ThemeSet::load_defaults()
            .themes
            .remove(theme_name)
            .ok_or_else(|| {
                LessonError::config(format!("unknown code highlighting theme '{theme_name}'"))
            })?;

        Ok(Self { syntaxes, theme })
    }

    /// `None` when highlighting is switched off.
    pub fn from_settings(settings: &CodeSettings) -> Result<Option<Self>> {
        if !settings.highlight {
            return Ok(None);
        }
        Self::new(&settings.theme).map(Some)
    }

    /// Highlight `code` as `language` (a fence tag such as `rust` or `py`).
    ///
    /// Without a usable tag the syntax is guessed from the first line
    /// (shebangs, `<?xml`, ...), falling back to plain text.
    pub fn highlight(&self, code: &str, language: Option<&str>) -> Result<String> {
        let syntax = self.pick_syntax(code, language);
        highlighted_html_for_string(code, &self.syntaxes, syntax, &self.theme)
            .map_err(|e| LessonError::Render(e.to_string()))
    }

    fn pick_syntax(&self, code: &str, language: Option<&str>) -> &SyntaxReference {
        if let Some(language) = language {
            if let Some(syntax) = self.syntaxes.find_syntax_by_token(language) {
                return syntax;
            }
            debug!(language, "no syntax for fence language, guessing");
        }
        self.syntaxes
            .find_syntax_by_first_line(code)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }
}

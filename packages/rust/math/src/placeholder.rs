//! Placeholder tokens standing in for extracted math until the final pass.

use tracing::debug;
use uuid::Uuid;

/// Marker that replaces one math span in the document text.
///
/// Shape: `MATH<nonce>N<index>X`. Only ASCII letters and digits, so the
/// Markdown converter and the heading restructurer copy it through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceholderToken(String);

impl PlaceholderToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlaceholderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues tokens for a single build.
///
/// The nonce is redrawn until the token prefix is absent from the source
/// text, so no token can ever match document content.
#[derive(Debug)]
pub struct TokenMint {
    prefix: String,
    issued: usize,
}

impl TokenMint {
    pub fn for_text(text: &str) -> Self {
        loop {
            let prefix = format!("MATH{}", Uuid::now_v7().simple());
            if !text.contains(&prefix) {
                return Self { prefix, issued: 0 };
            }
            debug!(%prefix, "token prefix found in source text, drawing another");
        }
    }

    pub fn next_token(&mut self) -> PlaceholderToken {
        self.issued += 1;
        // The trailing `X` keeps token 1 from being a prefix of token 10.
        PlaceholderToken(format!("{}N{}X", self.prefix, self.issued))
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Marker standing in for a source `\$` until the final pass.
    ///
    /// Shares the nonce with the tokens but never matches one: tokens continue
    /// the prefix with `N`, the marker with `DX`.
    pub fn escaped_dollar(&self) -> String {
        format!("{}DX", self.prefix)
    }
}

/// Token → rendered math, in extraction order.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTable {
    entries: Vec<(PlaceholderToken, String)>,
}

impl PlaceholderTable {
    pub fn insert(&mut self, token: PlaceholderToken, rendered: String) {
        self.entries.push((token, rendered));
    }

    #[cfg(test)]
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t.as_str() == token)
            .map(|(_, rendered)| rendered.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlaceholderToken, &str)> {
        self.entries.iter().map(|(t, r)| (t, r.as_str()))
    }
}

/// Substitute every placeholder in `markup` with its rendered math.
///
/// Must run after all structural rewriting: rendered MathML contains tags
/// that the restructurer would otherwise see.
pub fn resolve(markup: &str, table: &PlaceholderTable) -> String {
    let mut html = markup.to_string();
    for (token, rendered) in table.iter() {
        html = html.replace(token.as_str(), rendered);
    }
    html
}

/// Turn every escaped-dollar marker left in `markup` into a literal `$`.
///
/// Runs after [`resolve`]. Code has already had its markers written back as
/// `\$` during Markdown conversion, so whatever remains is running text.
pub fn restore_escaped_dollars(markup: &str, marker: &str) -> String {
    markup.replace(marker, "$")
}

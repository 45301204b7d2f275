//! Math extraction, rendering and placeholder resolution.
//!
//! Math spans are pulled out of the source text before Markdown conversion
//! and only put back, as rendered MathML, once every structural rewrite of
//! the HTML is done:
//!
//! 1. [`MathExtractor::extract`] swaps each span for a [`PlaceholderToken`]
//! 2. the document goes through Markdown conversion and heading restructuring
//! 3. [`resolve`] swaps each token for its rendered value
//!
//! Escaped dollars (`\$`) get the same treatment: a marker from the same
//! nonce hides them from the scan and [`restore_escaped_dollars`] puts them
//! back after resolution.

mod extract;
mod placeholder;
mod render;

pub use extract::{ExtractStats, Extraction, MathExtractor};
pub use placeholder::{
    PlaceholderTable, PlaceholderToken, TokenMint, resolve, restore_escaped_dollars,
};
pub use render::{MathMlRenderer, MathMode, MathRenderer, expand_macros};

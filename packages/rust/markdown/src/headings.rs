//! Heading restructuring.
//!
//! Lesson sources use four heading ranks for two unrelated things:
//!
//! - `#` / `##` are numbered outline entries (`1.`, `1.2`), emitted one rank lower
//! - `###` / `####` open a styled box and a nested inner box
//!
//! The HTML is first split into [`MarkupEvent`]s, then a small state machine
//! walks the events, numbers the outline and opens/closes boxes. Every box
//! that is opened is closed exactly once, at the latest at end of input.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use lessonbuild_shared::BoxSettings;

/// Markup closing one box layer: content wrapper, then the box.
const BOX_CLOSE: &str = "</div></div>\n";

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// The four heading ranks the restructurer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingRank {
    /// `<h1>`: numbered section.
    Section,
    /// `<h2>`: numbered subsection.
    Subsection,
    /// `<h3>`: outer box.
    Box,
    /// `<h4>`: inner box.
    InnerBox,
}

impl HeadingRank {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Section),
            2 => Some(Self::Subsection),
            3 => Some(Self::Box),
            4 => Some(Self::InnerBox),
            _ => None,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Self::Section => 1,
            Self::Subsection => 2,
            Self::Box => 3,
            Self::InnerBox => 4,
        }
    }
}

/// One piece of the HTML stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent<'a> {
    HeadingOpen(HeadingRank),
    HeadingClose(HeadingRank),
    /// Anything else, copied through verbatim.
    Literal(&'a str),
}

/// Split HTML into heading open/close events and literal runs.
///
/// Only bare `<h1>`–`<h4>` tags with a matching close tag further on count
/// as headings; an opening tag without one stays literal text. Concatenating
/// the literals and the original tags gives back the input.
pub fn tokenize(html: &str) -> Vec<MarkupEvent<'_>> {
    static OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<h[1-4]>").expect("valid regex"));

    let mut events = Vec::new();
    let mut cursor = 0;
    let mut literal_start = 0;

    while let Some(open) = OPEN_RE.find_at(html, cursor) {
        cursor = open.end();

        let level = html.as_bytes()[open.start() + 2] - b'0';
        let Some(rank) = HeadingRank::from_level(level) else {
            continue;
        };
        let close_tag = format!("</h{}>", rank.level());
        let Some(title_len) = html[open.end()..].find(&close_tag) else {
            continue;
        };
        let close_start = open.end() + title_len;

        if literal_start < open.start() {
            events.push(MarkupEvent::Literal(&html[literal_start..open.start()]));
        }
        events.push(MarkupEvent::HeadingOpen(rank));
        if title_len > 0 {
            events.push(MarkupEvent::Literal(&html[open.end()..close_start]));
        }
        events.push(MarkupEvent::HeadingClose(rank));

        cursor = close_start + close_tag.len();
        literal_start = cursor;
    }

    if literal_start < html.len() {
        events.push(MarkupEvent::Literal(&html[literal_start..]));
    }
    events
}

// ---------------------------------------------------------------------------
// Box vocabulary
// ---------------------------------------------------------------------------

/// How a depth-3 box is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Example,
    Known,
    Unknown,
}

/// Titles recognised for depth-3 boxes.
#[derive(Debug, Clone)]
pub struct BoxVocabulary {
    known_titles: HashSet<String>,
    example_title: String,
    example_label: String,
}

impl From<&BoxSettings> for BoxVocabulary {
    fn from(settings: &BoxSettings) -> Self {
        Self {
            known_titles: settings.known_titles.iter().cloned().collect(),
            example_title: settings.example_title.clone(),
            example_label: settings.example_label.clone(),
        }
    }
}

impl Default for BoxVocabulary {
    fn default() -> Self {
        Self::from(&BoxSettings::default())
    }
}

impl BoxVocabulary {
    pub fn classify(&self, title: &str) -> BoxKind {
        if title == self.example_title {
            BoxKind::Example
        } else if self.known_titles.contains(title) {
            BoxKind::Known
        } else {
            BoxKind::Unknown
        }
    }
}

/// Split `"Théorème (Pythagore)"` into `("Théorème", "Pythagore")`.
///
/// The annotation starts at the last `" ("` and only counts if the title
/// ends with `)`. Without one the extra text is empty.
pub fn split_annotation(title: &str) -> (&str, &str) {
    if title.ends_with(')') {
        if let Some(at) = title.rfind(" (") {
            return (title[..at].trim(), title[at + 2..title.len() - 1].trim());
        }
    }
    (title, "")
}

// ---------------------------------------------------------------------------
// Restructurer
// ---------------------------------------------------------------------------

/// Counters from one restructuring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestructureStats {
    pub sections: usize,
    pub subsections: usize,
    pub boxes_opened: usize,
    pub boxes_closed: usize,
    /// Inner boxes opened without an enclosing outer box.
    pub layer_mismatches: usize,
}

/// Output of [`restructure`].
#[derive(Debug, Clone)]
pub struct Restructured {
    pub html: String,
    pub stats: RestructureStats,
}

/// Which box layers are open.
///
/// Two flags rather than a single depth counter: an inner box can be open
/// without an outer one when a `<h4>` comes first. Closing after such an
/// unbalanced `<h4>` emits markup only for the boxes that were really
/// opened, so opens and closes always match.
#[derive(Debug, Default)]
struct OpenBoxes {
    outer: bool,
    inner: bool,
}

struct Restructurer<'v> {
    vocabulary: &'v BoxVocabulary,
    section: usize,
    subsection: usize,
    open: OpenBoxes,
    out: String,
    stats: RestructureStats,
}

impl<'v> Restructurer<'v> {
    fn new(vocabulary: &'v BoxVocabulary, capacity: usize) -> Self {
        Self {
            vocabulary,
            section: 0,
            subsection: 0,
            open: OpenBoxes::default(),
            out: String::with_capacity(capacity),
            stats: RestructureStats::default(),
        }
    }

    /// Close every open layer at `layer` or deeper (1 = outer, 2 = inner).
    fn close_down_to(&mut self, layer: u8) {
        if self.open.inner && layer <= 2 {
            self.out.push_str(BOX_CLOSE);
            self.open.inner = false;
            self.stats.boxes_closed += 1;
        }
        if self.open.outer && layer <= 1 {
            self.out.push_str(BOX_CLOSE);
            self.open.outer = false;
            self.stats.boxes_closed += 1;
        }
    }

    fn heading(&mut self, rank: HeadingRank, title: &str) {
        match rank {
            HeadingRank::Section => {
                self.close_down_to(1);
                self.section += 1;
                self.subsection = 0;
                self.stats.sections += 1;
                self.out
                    .push_str(&format!("<h2>{}. {title}</h2>\n", self.section));
            }
            HeadingRank::Subsection => {
                self.close_down_to(1);
                self.subsection += 1;
                self.stats.subsections += 1;
                self.out.push_str(&format!(
                    "<h3>{}.{} {title}</h3>\n",
                    self.section, self.subsection
                ));
            }
            HeadingRank::Box => {
                self.close_down_to(1);
                self.open.outer = true;
                self.stats.boxes_opened += 1;

                let (title, extra) = split_annotation(title);
                let opening = match self.vocabulary.classify(title) {
                    BoxKind::Example => format!(
                        "<div class=\"indent-box\"><h4 class=\"example\"><span class=\"title\">{}</span>&nbsp;: <span class=\"extra\">{extra}</span></h4><div class=\"content\">\n",
                        self.vocabulary.example_label
                    ),
                    kind => {
                        let flag = if kind == BoxKind::Unknown { " unknown" } else { "" };
                        format!(
                            "<div class=\"indent-box border\"><h4><span class=\"title{flag}\">{title}</span>&nbsp;: <span class=\"extra\">{extra}</span></h4><div class=\"content\">\n"
                        )
                    }
                };
                self.out.push_str(&opening);
            }
            HeadingRank::InnerBox => {
                self.close_down_to(2);
                if !self.open.outer {
                    warn!(title, "box layer mismatch: inner box without an enclosing box");
                    self.stats.layer_mismatches += 1;
                }
                self.open.inner = true;
                self.stats.boxes_opened += 1;

                let (title, extra) = split_annotation(title);
                self.out.push_str(&format!(
                    "<div class=\"indent-box\"><h5><span class=\"title\">{title}</span>&nbsp;: <span class=\"extra\">{extra}</span></h5><div class=\"content\">\n"
                ));
            }
        }
    }

    fn finish(mut self) -> Restructured {
        self.close_down_to(1);
        Restructured {
            html: self.out,
            stats: self.stats,
        }
    }
}

/// Rewrite `<h1>`–`<h4>` into numbered headings and nested boxes.
///
/// Non-heading markup is copied through unchanged. Box layer problems are
/// logged and counted, never fatal.
#[instrument(skip_all, fields(len = html.len()))]
pub fn restructure(html: &str, vocabulary: &BoxVocabulary) -> Restructured {
    let mut machine = Restructurer::new(vocabulary, html.len() + html.len() / 4);
    let mut events = tokenize(html).into_iter();

    while let Some(event) = events.next() {
        match event {
            MarkupEvent::Literal(text) => machine.out.push_str(text),
            MarkupEvent::HeadingOpen(rank) => {
                let mut title = String::new();
                for inner in events.by_ref() {
                    match inner {
                        MarkupEvent::Literal(text) => title.push_str(text),
                        MarkupEvent::HeadingClose(_) => break,
                        MarkupEvent::HeadingOpen(_) => {}
                    }
                }
                machine.heading(rank, title.trim());
            }
            // The tokenizer pairs every close with its open.
            MarkupEvent::HeadingClose(_) => {}
        }
    }

    let restructured = machine.finish();
    debug!(
        sections = restructured.stats.sections,
        boxes = restructured.stats.boxes_opened,
        mismatches = restructured.stats.layer_mismatches,
        "headings restructured"
    );
    restructured
}

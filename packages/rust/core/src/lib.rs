//! Build pipeline orchestration for lessonbuild.
//!
//! This crate ties together fragment reading, math extraction, Markdown
//! conversion, heading restructuring and template output into one
//! end-to-end workflow ([`pipeline::build_lesson`]).

pub mod emitter;
pub mod pipeline;
pub mod source;

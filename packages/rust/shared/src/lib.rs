//! Shared error model and configuration for lessonbuild.
//!
//! This crate is the foundation depended on by all other lessonbuild crates.
//! It provides:
//! - [`LessonError`] — the unified error type
//! - Configuration ([`BuildSettings`] and its sections, config loading)

pub mod config;
pub mod error;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BoxSettings, BuildSettings, CodeSettings, MathSettings, OutputSettings, SourceSettings,
    check_output_folder, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{LessonError, Result};

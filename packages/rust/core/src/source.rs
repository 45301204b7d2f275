//! Lesson fragment reader.
//!
//! A lesson is every file in one folder whose name matches the configured
//! prefix and suffix (`alm_*.md` by default), concatenated in file name order.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use lessonbuild_shared::{LessonError, Result, SourceSettings};

/// The concatenated lesson text plus the files it came from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// All fragments, each followed by a blank line.
    pub text: String,
    /// Fragment paths in the order they were concatenated.
    pub fragments: Vec<PathBuf>,
}

/// Read and concatenate the lesson fragments in `folder`.
#[instrument(skip_all, fields(folder = %folder.display()))]
pub fn read_sources(folder: &Path, selection: &SourceSettings) -> Result<SourceDocument> {
    if !folder.is_dir() {
        return Err(LessonError::validation(format!(
            "source folder '{}' is not a directory",
            folder.display()
        )));
    }

    let entries = std::fs::read_dir(folder).map_err(|e| LessonError::io(folder, e))?;

    let mut fragments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LessonError::io(folder, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            debug!(name = ?entry.file_name(), "skipping non UTF-8 file name");
            continue;
        };
        if !name.starts_with(&selection.prefix) || !name.ends_with(&selection.suffix) {
            continue;
        }

        let path = entry.path();
        if path.is_file() {
            fragments.push(path);
        }
    }
    fragments.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if fragments.is_empty() {
        warn!(
            prefix = %selection.prefix,
            suffix = %selection.suffix,
            "no lesson fragments found"
        );
    }

    let mut text = String::new();
    for path in &fragments {
        let content = std::fs::read_to_string(path).map_err(|e| LessonError::io(path, e))?;
        debug!(file = %path.display(), len = content.len(), "read fragment");
        text.push_str(&content);
        text.push_str("\n\n");
    }

    info!(fragments = fragments.len(), len = text.len(), "lesson sources read");

    Ok(SourceDocument { text, fragments })
}

//! Output folder writer.
//!
//! Replaces the output folder's contents with a copy of the template folder,
//! then fills `${title}` and `${content}` in its `index.html`.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use lessonbuild_shared::{LessonError, Result, check_output_folder};

/// Entry page of the template; the only file that gets placeholders filled.
pub const INDEX_FILE: &str = "index.html";

const TITLE_SLOT: &str = "${title}";
const CONTENT_SLOT: &str = "${content}";

/// Write the finished lesson. Returns the path of the written `index.html`.
///
/// The template and the folder layout are checked before anything in
/// `output_dir` is removed.
#[instrument(skip_all, fields(template = %template_dir.display(), output = %output_dir.display(), title = %title))]
pub fn emit(template_dir: &Path, output_dir: &Path, title: &str, html: &str) -> Result<PathBuf> {
    if !template_dir.join(INDEX_FILE).is_file() {
        return Err(LessonError::template(format!(
            "{INDEX_FILE} not found in template folder '{}'",
            template_dir.display()
        )));
    }
    check_output_folder(output_dir, template_dir, None)?;

    empty_folder(output_dir)?;
    copy_folder(template_dir, output_dir)?;

    let index_path = output_dir.join(INDEX_FILE);
    let page = std::fs::read_to_string(&index_path)
        .map_err(|e| LessonError::io(&index_path, e))?;
    let page = page.replace(TITLE_SLOT, title).replace(CONTENT_SLOT, html);
    std::fs::write(&index_path, &page).map_err(|e| LessonError::io(&index_path, e))?;

    info!(path = %index_path.display(), size = page.len(), "lesson written");
    Ok(index_path)
}

/// Remove everything inside `folder`, keeping the folder itself.
/// A missing folder is created.
fn empty_folder(folder: &Path) -> Result<()> {
    if !folder.exists() {
        std::fs::create_dir_all(folder).map_err(|e| LessonError::io(folder, e))?;
        return Ok(());
    }

    let entries = std::fs::read_dir(folder).map_err(|e| LessonError::io(folder, e))?;
    for entry in entries {
        let path = entry.map_err(|e| LessonError::io(folder, e))?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| LessonError::io(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| LessonError::io(&path, e))?;
        }
    }
    debug!(folder = %folder.display(), "output folder emptied");
    Ok(())
}

/// Recursively copy `source` into `destination`.
fn copy_folder(source: &Path, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination).map_err(|e| LessonError::io(destination, e))?;

    let entries = std::fs::read_dir(source).map_err(|e| LessonError::io(source, e))?;
    for entry in entries {
        let from = entry.map_err(|e| LessonError::io(source, e))?.path();
        let Some(name) = from.file_name() else {
            continue;
        };
        let to = destination.join(name);

        if from.is_dir() {
            copy_folder(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| LessonError::io(&from, e))?;
        }
    }
    Ok(())
}

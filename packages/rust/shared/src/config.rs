//! Build configuration for lessonbuild.
//!
//! Lookup order: an explicit `--config` path, then `./lessonbuild.toml`,
//! then `~/.lessonbuild/lessonbuild.toml`, then built-in defaults.
//! CLI flags override config file values.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LessonError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lessonbuild.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lessonbuild";

// ---------------------------------------------------------------------------
// Config structs (matching lessonbuild.toml schema)
// ---------------------------------------------------------------------------

/// Top-level build settings, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Which fragment files make up a lesson.
    #[serde(default)]
    pub source: SourceSettings,

    /// Template and output locations.
    #[serde(default)]
    pub output: OutputSettings,

    /// TeX rendering options.
    #[serde(default)]
    pub math: MathSettings,

    /// Box vocabulary for depth-3 headings.
    #[serde(default)]
    pub boxes: BoxSettings,

    /// Code block highlighting.
    #[serde(default)]
    pub code: CodeSettings,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Fragment file names must start with this.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Fragment file names must end with this.
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            suffix: default_suffix(),
        }
    }
}

fn default_prefix() -> String {
    "alm_".into()
}
fn default_suffix() -> String {
    ".md".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Folder whose contents are copied into the output; must hold `index.html`.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// Folder that is emptied and repopulated on every build.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            template_dir: default_template_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("template")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

/// `[math]` section.
///
/// Passed by value to the math extractor; there is no global renderer state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathSettings {
    /// TeX macros, keyed by command name without the leading backslash.
    #[serde(default = "default_macros")]
    pub macros: BTreeMap<String, String>,
}

impl Default for MathSettings {
    fn default() -> Self {
        Self {
            macros: default_macros(),
        }
    }
}

fn default_macros() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("llbracket".to_string(), r"\left[".to_string()),
        ("rrbracket".to_string(), r"\right] \cap \mathbb{Z}".to_string()),
    ])
}

/// `[boxes]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxSettings {
    /// Depth-3 titles styled as regular boxes; anything else is flagged `unknown`.
    #[serde(default = "default_known_titles")]
    pub known_titles: Vec<String>,

    /// Depth-3 title that gets the example styling.
    #[serde(default = "default_example_title")]
    pub example_title: String,

    /// Short label shown in place of the example title.
    #[serde(default = "default_example_label")]
    pub example_label: String,
}

impl Default for BoxSettings {
    fn default() -> Self {
        Self {
            known_titles: default_known_titles(),
            example_title: default_example_title(),
            example_label: default_example_label(),
        }
    }
}

fn default_known_titles() -> Vec<String> {
    [
        "Définition",
        "Propriété",
        "Théorème",
        "Remarque",
        "Lemme",
        "Corollaire",
        "Notation",
        "Démonstration",
        "Vocabulaire",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_example_title() -> String {
    "Exemple".into()
}
fn default_example_label() -> String {
    "ex".into()
}

/// `[code]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSettings {
    /// Highlight code blocks; when off they are emitted as plain `<pre><code>`.
    #[serde(default = "default_highlight")]
    pub highlight: bool,

    /// Name of a theme bundled with `syntect`.
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            highlight: default_highlight(),
            theme: default_theme(),
        }
    }
}

fn default_highlight() -> bool {
    true
}
fn default_theme() -> String {
    "base16-ocean.light".into()
}

impl BuildSettings {
    /// Reject settings that make no sense whatever folders are involved.
    pub fn validate(&self) -> Result<()> {
        if self.source.prefix.is_empty() && self.source.suffix.is_empty() {
            return Err(LessonError::config(
                "source prefix and suffix are both empty; every file would be read as a fragment",
            ));
        }
        Ok(())
    }

    /// Reject folder layouts where a build would delete its own inputs.
    /// See [`check_output_folder`].
    pub fn check_folders(&self, source_dir: &Path) -> Result<()> {
        check_output_folder(
            &self.output.output_dir,
            &self.output.template_dir,
            Some(source_dir),
        )
    }
}

// ---------------------------------------------------------------------------
// Folder checks
// ---------------------------------------------------------------------------

/// Make sure emptying `output_dir` cannot touch the build inputs.
///
/// Paths are compared after resolving `.`, `..` and symlinks, so `template`
/// and `./template` are the same folder. Rejected:
///
/// - an output folder that is, or contains, the template or source folder
/// - an output folder inside the template folder (the copy would recurse)
///
/// An output folder inside the source folder is fine.
pub fn check_output_folder(
    output_dir: &Path,
    template_dir: &Path,
    source_dir: Option<&Path>,
) -> Result<()> {
    let output = resolve_path(output_dir)?;
    let template = resolve_path(template_dir)?;

    if template.starts_with(&output) {
        return Err(LessonError::config(format!(
            "output folder '{}' is or contains the template folder '{}'; it is emptied on every build",
            output_dir.display(),
            template_dir.display()
        )));
    }
    if output.starts_with(&template) {
        return Err(LessonError::config(format!(
            "output folder '{}' is inside the template folder '{}'",
            output_dir.display(),
            template_dir.display()
        )));
    }
    if let Some(source_dir) = source_dir {
        if resolve_path(source_dir)?.starts_with(&output) {
            return Err(LessonError::config(format!(
                "output folder '{}' is or contains the lesson folder '{}'; it is emptied on every build",
                output_dir.display(),
                source_dir.display()
            )));
        }
    }
    Ok(())
}

/// Absolute form of `path`: `.` and `..` folded, then the longest existing
/// prefix canonicalized. The part that does not exist yet is kept as is.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| LessonError::io(path, e))?;

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(missing.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(lexical),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.lessonbuild/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LessonError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.lessonbuild/lessonbuild.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load settings from `./lessonbuild.toml` or the user config file.
/// Returns defaults if neither exists.
pub fn load_config() -> Result<BuildSettings> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return load_config_from(&local);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(BuildSettings::default());
    }

    load_config_from(&path)
}

/// Load settings from a specific file path.
pub fn load_config_from(path: &Path) -> Result<BuildSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| LessonError::io(path, e))?;

    let settings: BuildSettings = toml::from_str(&content).map_err(|e| {
        LessonError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "loaded config");

    Ok(settings)
}

/// Create the user config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LessonError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let settings = BuildSettings::default();
    let content =
        toml::to_string_pretty(&settings).map_err(|e| LessonError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LessonError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serialize() {
        let settings = BuildSettings::default();
        let toml_str = toml::to_string_pretty(&settings).expect("serialize default settings");
        assert!(toml_str.contains("prefix = \"alm_\""));
        assert!(toml_str.contains("llbracket"));
        assert!(toml_str.contains("Exemple"));
    }

    #[test]
    fn settings_roundtrip() {
        let settings = BuildSettings::default();
        let toml_str = toml::to_string_pretty(&settings).expect("serialize");
        let parsed: BuildSettings = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.suffix, ".md");
        assert_eq!(parsed.boxes.known_titles.len(), 9);
        assert_eq!(parsed.output.output_dir, PathBuf::from("dist"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[source]
prefix = "chap_"

[boxes]
example_title = "Example"
"#;
        let settings: BuildSettings = toml::from_str(toml_str).expect("parse");
        assert_eq!(settings.source.prefix, "chap_");
        assert_eq!(settings.source.suffix, ".md");
        assert_eq!(settings.boxes.example_title, "Example");
        assert_eq!(settings.boxes.example_label, "ex");
        assert!(settings.boxes.known_titles.contains(&"Lemme".to_string()));
        assert_eq!(settings.math.macros.len(), 2);
    }

    #[test]
    fn custom_macros_replace_defaults() {
        let toml_str = r#"
[math.macros]
R = "\\mathbb{R}"
"#;
        let settings: BuildSettings = toml::from_str(toml_str).expect("parse");
        assert_eq!(settings.math.macros.len(), 1);
        assert_eq!(settings.math.macros["R"], r"\mathbb{R}");
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lb-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_folders_are_accepted() {
        let settings = BuildSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.check_folders(Path::new("lessons/suites")).is_ok());
    }

    #[test]
    fn output_equal_to_template_is_rejected_in_any_spelling() {
        let err = check_output_folder(Path::new("./template"), Path::new("template"), None)
            .unwrap_err();
        assert!(matches!(err, LessonError::Config { .. }));
        assert!(err.to_string().contains("emptied on every build"));

        assert!(
            check_output_folder(Path::new("template/../template/"), Path::new("template"), None)
                .is_err()
        );
    }

    #[test]
    fn output_containing_template_is_rejected() {
        let root = temp_dir();
        let template = root.join("site/template");
        std::fs::create_dir_all(&template).unwrap();

        assert!(check_output_folder(&root.join("site"), &template, None).is_err());
        assert!(check_output_folder(&root.join("site/template/.."), &template, None).is_err());
        assert!(check_output_folder(&root.join("site/dist"), &template, None).is_ok());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn output_inside_template_is_rejected() {
        let err = check_output_folder(Path::new("template/dist"), Path::new("template"), None)
            .unwrap_err();
        assert!(err.to_string().contains("inside the template folder"));
    }

    #[test]
    fn output_containing_sources_is_rejected() {
        let mut settings = BuildSettings::default();
        settings.output.output_dir = PathBuf::from(".");
        settings.output.template_dir = PathBuf::from("../template");

        let err = settings.check_folders(Path::new("lesson")).unwrap_err();
        assert!(err.to_string().contains("lesson folder"));

        settings.output.output_dir = PathBuf::from("lesson");
        assert!(settings.check_folders(Path::new("./lesson")).is_err());
    }

    #[test]
    fn output_inside_sources_is_accepted() {
        let settings = BuildSettings::default();
        assert!(settings.check_folders(Path::new(".")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_output_is_resolved() {
        let root = temp_dir();
        let template = root.join("template");
        std::fs::create_dir_all(&template).unwrap();
        std::os::unix::fs::symlink(&template, root.join("alias")).unwrap();

        assert!(check_output_folder(&root.join("alias"), &template, None).is_err());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn code_section_defaults() {
        let settings: BuildSettings = toml::from_str("[code]\nhighlight = false\n").expect("parse");
        assert!(!settings.code.highlight);
        assert_eq!(settings.code.theme, "base16-ocean.light");
        assert!(BuildSettings::default().code.highlight);
    }

    #[test]
    fn validate_rejects_unfiltered_sources() {
        let mut settings = BuildSettings::default();
        settings.source.prefix.clear();
        settings.source.suffix.clear();
        assert!(settings.validate().is_err());
    }
}

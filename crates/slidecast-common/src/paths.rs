//! Path utilities for detecting input kinds by extension.
//!
//! Used by the upload path to classify what a user submitted before a job
//! record is created.

use crate::InputKind;
use std::path::Path;

/// Extensions treated as prose documents.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "md"];

/// Extensions treated as slide decks.
const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx"];

/// Extensions treated as LaTeX paper archives.
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tex"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Detect the input kind of an uploaded file from its extension.
///
/// Zip files are classified as paper archives; an image zip has no
/// distinguishing extension and must be requested explicitly.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use slidecast_common::{paths::detect_input_kind, InputKind};
///
/// assert_eq!(detect_input_kind(Path::new("paper.pdf")), Some(InputKind::Document));
/// assert_eq!(detect_input_kind(Path::new("deck.pptx")), Some(InputKind::Presentation));
/// assert_eq!(detect_input_kind(Path::new("sources.zip")), Some(InputKind::PaperArchive));
/// assert_eq!(detect_input_kind(Path::new("photo.exe")), None);
/// ```
pub fn detect_input_kind(path: &Path) -> Option<InputKind> {
    let ext = extension_of(path)?;
    if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        Some(InputKind::Document)
    } else if PRESENTATION_EXTENSIONS.contains(&ext.as_str()) {
        Some(InputKind::Presentation)
    } else if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
        Some(InputKind::PaperArchive)
    } else {
        None
    }
}

/// Presentation title derived from a filename: the stem without extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use slidecast_common::paths::title_from_filename;
///
/// assert_eq!(title_from_filename(Path::new("attention_is_all_you_need.pdf")),
///            "attention_is_all_you_need");
/// ```
pub fn title_from_filename(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Presentation")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_case_insensitive() {
        assert_eq!(
            detect_input_kind(Path::new("PAPER.PDF")),
            Some(InputKind::Document)
        );
        assert_eq!(
            detect_input_kind(Path::new("deck.PpTx")),
            Some(InputKind::Presentation)
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_input_kind(Path::new("video.mkv")), None);
        assert_eq!(detect_input_kind(Path::new("no_extension")), None);
    }

    #[test]
    fn test_title_fallback() {
        assert_eq!(title_from_filename(Path::new("")), "Presentation");
        assert_eq!(title_from_filename(Path::new("a.b.pdf")), "a.b");
    }
}

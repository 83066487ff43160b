use std::path::{Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Pdf,
    Html,
    Docx,
    PlainText,
}

impl DocFormat {
    /// Plain-text support is configurable; the rest of the set is fixed.
    pub fn from_extension(ext: &str, plain_text: bool) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "html" | "htm" => Some(Self::Html),
            "docx" => Some(Self::Docx),
            "txt" | "md" if plain_text => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Docx => "docx",
            Self::PlainText => "text",
        }
    }
}

/// Recursively enumerate supported files under `dir`. Unsupported
/// extensions are skipped; a missing or empty directory yields nothing.
pub fn walk_directory(dir: &Path, plain_text: bool) -> Vec<(PathBuf, DocFormat)> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            let ext = path.extension()?.to_str()?;
            let format = DocFormat::from_extension(ext, plain_text)?;
            Some((path, format))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_fixed_extension_set() {
        assert_eq!(DocFormat::from_extension("PDF", false), Some(DocFormat::Pdf));
        assert_eq!(DocFormat::from_extension("htm", false), Some(DocFormat::Html));
        assert_eq!(DocFormat::from_extension("html", false), Some(DocFormat::Html));
        assert_eq!(DocFormat::from_extension("docx", false), Some(DocFormat::Docx));
        assert_eq!(DocFormat::from_extension("exe", false), None);
    }

    #[test]
    fn plain_text_is_gated_by_flag() {
        assert_eq!(DocFormat::from_extension("txt", false), None);
        assert_eq!(
            DocFormat::from_extension("txt", true),
            Some(DocFormat::PlainText)
        );
        assert_eq!(
            DocFormat::from_extension("md", true),
            Some(DocFormat::PlainText)
        );
    }

    #[test]
    fn walks_nested_directories_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.html"), "<p>hi</p>").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("c.bin"), [0u8; 4]).unwrap();

        let mut found = walk_directory(dir.path(), true);
        found.sort_by_key(|(path, _)| path.clone());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].1, DocFormat::Html);
        assert_eq!(found[1].1, DocFormat::PlainText);
    }

    #[test]
    fn missing_directory_yields_nothing() {
        let files = walk_directory(Path::new("/nonexistent/for/sure"), true);
        assert!(files.is_empty());
    }
}

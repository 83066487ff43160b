use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::ingest::walker::walk_directory;
use crate::models::FileInfo;

/// The managed document folder. Uploads land flat by basename; deletes are
/// confined to the folder. Errors are reported as strings because the
/// handlers surface them verbatim in status messages.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save an upload under its basename, silently overwriting an existing
    /// file of the same name.
    pub fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, String> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| format!("Invalid file name: {}", file_name))?;
        let target = self.root.join(name);
        std::fs::write(&target, bytes).map_err(|e| format!("Failed to write {}: {}", file_name, e))?;
        Ok(target)
    }

    /// Delete one file given a path relative to the folder (a path that
    /// already carries the folder prefix is accepted too).
    pub fn remove(&self, path: &str) -> Result<String, String> {
        let relative = Path::new(path)
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(path));
        let resolved = self.safe_resolve(&relative)?;
        if !resolved.is_file() {
            return Err(format!("Not a file: {}", path));
        }
        std::fs::remove_file(&resolved).map_err(|e| format!("{}", e))?;
        Ok(resolved
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string()))
    }

    pub fn list(&self, plain_text: bool) -> Vec<FileInfo> {
        walk_directory(&self.root, plain_text)
            .into_iter()
            .filter_map(|(path, format)| {
                let metadata = std::fs::metadata(&path).ok()?;
                let modified: DateTime<Utc> = metadata.modified().ok()?.into();
                Some(FileInfo {
                    name: path
                        .strip_prefix(&self.root)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .to_string(),
                    size: metadata.len(),
                    format: format.label().to_string(),
                    modified_at: modified,
                })
            })
            .collect()
    }

    /// Resolve a relative path, rejecting anything that escapes the folder.
    fn safe_resolve(&self, relative: &Path) -> Result<PathBuf, String> {
        if relative.as_os_str().is_empty() {
            return Err("Path cannot be empty".to_string());
        }
        let joined = self.root.join(relative);
        let canonical = joined
            .canonicalize()
            .map_err(|e| format!("Invalid path {}: {}", relative.display(), e))?;
        let base = self
            .root
            .canonicalize()
            .map_err(|e| format!("Upload dir error: {}", e))?;
        if !canonical.starts_with(&base) {
            return Err("Path traversal not allowed".to_string());
        }
        Ok(canonical)
    }
}

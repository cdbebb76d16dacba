//! Chapter directory access.
//!
//! Every filename coming from a transport is resolved against the configured root and must
//! stay inside it once symlinks and `..` segments are resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{NoteError, NoteResult};

const CHAPTER_EXTENSIONS: [&str; 2] = ["md", "mdx"];

// One chapter file in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFile {
    pub name: String,
    pub modified: DateTime<Utc>,
}

// Chapter files, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterListing {
    pub files: Vec<ChapterFile>,
    pub last_modified: Option<String>,
}

impl ChapterListing {
    pub fn names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ChapterDir {
    root: PathBuf,
}

pub fn is_chapter_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| CHAPTER_EXTENSIONS.contains(&ext))
}

impl ChapterDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn canonical_root(&self) -> NoteResult<PathBuf> {
        fs::canonicalize(&self.root).await.map_err(|e| {
            NoteError::io(
                format!("Failed to access chapters directory '{}'", self.root.display()),
                e,
            )
        })
    }

    /// List `.md`/`.mdx` files sorted by modification time, newest first.
    pub async fn list(&self) -> NoteResult<ChapterListing> {
        let read_err = |e| {
            NoteError::io(
                format!("Failed to read directory '{}'", self.root.display()),
                e,
            )
        };

        let mut entries = fs::read_dir(&self.root).await.map_err(read_err)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let path = entry.path();
            if !is_chapter_file(&path) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();

            files.push(ChapterFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                modified,
            });
        }

        files.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.name.cmp(&b.name))
        });

        let last_modified = files.first().map(|f| f.name.clone());
        Ok(ChapterListing {
            files,
            last_modified,
        })
    }

    /// Resolve `filename` to an existing file inside the root.
    pub async fn resolve(&self, filename: &str) -> NoteResult<PathBuf> {
        if filename.trim().is_empty() {
            return Err(NoteError::MissingInput("filename"));
        }

        let root = self.canonical_root().await?;
        let resolved = match fs::canonicalize(root.join(filename)).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NoteError::FileNotFound(filename.to_string()));
            }
            Err(e) => {
                return Err(NoteError::io(format!("Failed to resolve '{}'", filename), e));
            }
        };

        if !resolved.starts_with(&root) {
            tracing::warn!(filename, "rejected path outside chapters directory");
            return Err(NoteError::PathEscape(filename.to_string()));
        }

        let is_file = fs::metadata(&resolved)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(NoteError::FileNotFound(filename.to_string()));
        }

        Ok(resolved)
    }

    /// Resolve `filename` for writing: existing files resolve as in [`ChapterDir::resolve`],
    /// new files must be plain relative paths whose parent directory is inside the root.
    pub async fn resolve_new(&self, filename: &str) -> NoteResult<PathBuf> {
        match self.resolve(filename).await {
            Err(NoteError::FileNotFound(_)) => {}
            other => return other,
        }

        let relative = Path::new(filename);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(NoteError::PathEscape(filename.to_string()));
        }

        let root = self.canonical_root().await?;
        let target = root.join(relative);
        let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
            return Err(NoteError::FileNotFound(filename.to_string()));
        };

        let parent = fs::canonicalize(parent)
            .await
            .map_err(|_| NoteError::FileNotFound(filename.to_string()))?;
        if !parent.starts_with(&root) {
            return Err(NoteError::PathEscape(filename.to_string()));
        }

        Ok(parent.join(name))
    }

    pub async fn read(&self, filename: &str) -> NoteResult<String> {
        let path = self.resolve(filename).await?;
        read_path(&path).await
    }

    /// Append `"\n\n" + content` to an existing file.
    pub async fn append(&self, filename: &str, content: &str) -> NoteResult<()> {
        if content.is_empty() {
            return Err(NoteError::MissingInput("content"));
        }
        let path = self.resolve(filename).await?;

        let write_err = |e| NoteError::io(format!("Failed to append to '{}'", filename), e);
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        file.write_all(format!("\n\n{}", content).as_bytes())
            .await
            .map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        Ok(())
    }

    /// Overwrite (or create) a file inside the root.
    pub async fn write(&self, filename: &str, content: &str) -> NoteResult<()> {
        let path = self.resolve_new(filename).await?;
        write_atomic(&path, content).await
    }
}

pub(crate) async fn read_path(path: &Path) -> NoteResult<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| NoteError::io(format!("Failed to read '{}'", path.display()), e))
}

/// Write to a sibling temp file, then rename it over `path`.
pub(crate) async fn write_atomic(path: &Path, content: &str) -> NoteResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&temp_path, content).await.map_err(|e| {
        NoteError::io(
            format!("Failed to write temp file '{}'", temp_path.display()),
            e,
        )
    })?;

    // Rename can fail on Windows while another process holds the file open
    if let Err(e) = fs::rename(&temp_path, path).await {
        tracing::warn!(path = %path.display(), error = %e, "rename failed, writing in place");
        if let Err(e) = fs::remove_file(&temp_path).await {
            tracing::warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
        }
        fs::write(path, content)
            .await
            .map_err(|e| NoteError::io(format!("Failed to write '{}'", path.display()), e))?;
    }

    Ok(())
}

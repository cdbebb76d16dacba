//! Chapters directory configuration.
//!
//! The directory is named by a one-line text file. It is resolved once at startup and only
//! changes through [`AppConfig::set_chapters_dir`].

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "chapters-dir.txt";

#[derive(Debug, Clone)]
pub struct AppConfig {
    chapters_dir: PathBuf,
    config_path: Option<PathBuf>,
}

/// Config file locations, in search order: working directory, then next to the executable.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(CONFIG_FILE_NAME));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let path = exe_dir.join(CONFIG_FILE_NAME);
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }
    candidates
}

// First non-blank line of the config file; relative paths are taken from the file's folder
fn read_config_file(path: &Path) -> Option<PathBuf> {
    let content = std::fs::read_to_string(path).ok()?;
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;

    let dir = PathBuf::from(line);
    if dir.is_absolute() {
        Some(dir)
    } else {
        Some(path.parent().unwrap_or(Path::new(".")).join(dir))
    }
}

impl AppConfig {
    pub fn new(chapters_dir: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            chapters_dir,
            config_path,
        }
    }

    /// Load from the standard candidate paths, falling back to the working directory.
    pub fn load() -> Self {
        let fallback = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_from(&candidate_paths(), fallback)
    }

    pub fn load_from(candidates: &[PathBuf], fallback: PathBuf) -> Self {
        for candidate in candidates {
            if let Some(dir) = read_config_file(candidate) {
                tracing::info!(
                    config = %candidate.display(),
                    chapters_dir = %dir.display(),
                    "loaded chapters directory"
                );
                return Self::new(dir, Some(candidate.clone()));
            }
        }

        tracing::info!(
            chapters_dir = %fallback.display(),
            "no config file found, using working directory"
        );
        Self::new(fallback, None)
    }

    pub fn chapters_dir(&self) -> &Path {
        &self.chapters_dir
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Switch to `dir` and persist it. Writes the config file that was loaded, or a new one
    /// in the working directory when none was found.
    pub fn set_chapters_dir(&mut self, dir: &Path) -> Result<PathBuf> {
        let dir = std::fs::canonicalize(dir)
            .with_context(|| format!("Failed to resolve directory '{}'", dir.display()))?;
        if !dir.is_dir() {
            bail!("Not a directory: {}", dir.display());
        }

        let config_path = match &self.config_path {
            Some(path) => path.clone(),
            None => std::env::current_dir()
                .context("Failed to determine working directory")?
                .join(CONFIG_FILE_NAME),
        };

        std::fs::write(&config_path, format!("{}\n", dir.display()))
            .with_context(|| format!("Failed to write config '{}'", config_path.display()))?;

        tracing::info!(chapters_dir = %dir.display(), "chapters directory changed");
        self.chapters_dir = dir.clone();
        self.config_path = Some(config_path);
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_first_candidate_wins() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        std::fs::write(&first, "\n  /books/novel  \n").unwrap();
        std::fs::write(&second, "/books/other\n").unwrap();

        let config = AppConfig::load_from(&[first.clone(), second], PathBuf::from("/fallback"));
        assert_eq!(config.chapters_dir(), Path::new("/books/novel"));
        assert_eq!(config.config_path(), Some(first.as_path()));
    }

    #[test]
    fn test_load_skips_missing_and_blank_files() {
        let dir = TempDir::new().unwrap();
        let blank = dir.path().join("blank.txt");
        let good = dir.path().join("good.txt");
        std::fs::write(&blank, "   \n\n").unwrap();
        std::fs::write(&good, "drafts").unwrap();

        let config = AppConfig::load_from(
            &[dir.path().join("missing.txt"), blank, good.clone()],
            PathBuf::from("/fallback"),
        );
        assert_eq!(config.chapters_dir(), dir.path().join("drafts"));
        assert_eq!(config.config_path(), Some(good.as_path()));
    }

    #[test]
    fn test_load_falls_back() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&[dir.path().join("absent.txt")], dir.path().to_path_buf());
        assert_eq!(config.chapters_dir(), dir.path());
        assert!(config.config_path().is_none());
    }

    #[test]
    fn test_set_chapters_dir_rewrites_loaded_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let new_dir = dir.path().join("book");
        std::fs::create_dir(&new_dir).unwrap();
        std::fs::write(&config_path, "/old/place\n").unwrap();

        let mut config = AppConfig::load_from(&[config_path.clone()], PathBuf::from("."));
        let chosen = config.set_chapters_dir(&new_dir).unwrap();

        assert_eq!(chosen, std::fs::canonicalize(&new_dir).unwrap());
        assert_eq!(config.chapters_dir(), chosen.as_path());
        let written = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(written.trim(), chosen.display().to_string());
    }

    #[test]
    fn test_set_chapters_dir_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = AppConfig::new(dir.path().to_path_buf(), Some(config_path.clone()));

        assert!(config.set_chapters_dir(&dir.path().join("nope")).is_err());
        assert_eq!(config.chapters_dir(), dir.path());
        assert!(!config_path.exists());
    }
}

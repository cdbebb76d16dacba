use serde::{Deserialize, Serialize};

use crate::chapters::{self, ChapterDir, ChapterListing};
use crate::error::{NoteError, NoteResult};
use crate::notes::{self, NoteSummary};

// A note found by id somewhere in the chapters directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLookup {
    pub filename: String,
    pub content: String,
    pub reference: String,
}

/// Note operations over one chapters directory.
///
/// Nothing is cached: every call reads the files again.
#[derive(Debug, Clone)]
pub struct NoteStore {
    chapters: ChapterDir,
}

impl NoteStore {
    pub fn new(chapters: ChapterDir) -> Self {
        Self { chapters }
    }

    pub fn chapters(&self) -> &ChapterDir {
        &self.chapters
    }

    pub async fn list_files(&self) -> NoteResult<ChapterListing> {
        self.chapters.list().await
    }

    pub async fn append(&self, filename: &str, content: &str) -> NoteResult<()> {
        self.chapters.append(filename, content).await?;
        tracing::info!(filename, bytes = content.len(), "appended content");
        Ok(())
    }

    pub async fn list_notes(&self, filename: &str) -> NoteResult<Vec<NoteSummary>> {
        let text = self.chapters.read(filename).await?;
        Ok(notes::extract_notes(&text))
    }

    /// Find note `id` in the first chapter file (listing order) that contains it.
    ///
    /// A copy of the note with a broken tag does not count as a match.
    pub async fn get_note(&self, id: &str) -> NoteResult<NoteLookup> {
        if id.is_empty() {
            return Err(NoteError::MissingInput("id"));
        }

        let listing = self.chapters.list().await?;
        for file in listing.files {
            let path = self.chapters.resolve(&file.name).await?;
            let text = chapters::read_path(&path).await?;

            match notes::read_note(&text, id) {
                Ok(parts) => {
                    return Ok(NoteLookup {
                        filename: file.name,
                        content: parts.content,
                        reference: parts.reference,
                    });
                }
                Err(NoteError::NoteNotFound(_)) => continue,
                Err(
                    e @ (NoteError::MalformedTag(_)
                    | NoteError::MissingClosingTag(_)
                    | NoteError::NestedNote(_)),
                ) => {
                    tracing::warn!(note_id = id, filename = %file.name, error = %e, "skipping broken note");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(NoteError::NoteNotFound(id.to_string()))
    }

    /// Replace the body of note `id` inside `filename`.
    ///
    /// The file is only rewritten once the new text has been built, so every failure leaves
    /// it untouched.
    pub async fn update_note(&self, id: &str, filename: &str, content: &str) -> NoteResult<()> {
        if id.is_empty() {
            return Err(NoteError::MissingInput("id"));
        }
        if filename.is_empty() {
            return Err(NoteError::MissingInput("filename"));
        }
        if content.is_empty() {
            return Err(NoteError::MissingInput("content"));
        }

        let path = self.chapters.resolve(filename).await?;
        let text = chapters::read_path(&path).await?;
        let updated = notes::replace_note_body(&text, id, content)?;
        chapters::write_atomic(&path, &updated).await?;

        tracing::info!(note_id = id, filename, "updated note");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, content: &str, secs: u64) {
        std::fs::write(path, content).unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn store(dir: &TempDir) -> NoteStore {
        NoteStore::new(ChapterDir::new(dir.path()))
    }

    #[tokio::test]
    async fn test_list_notes_in_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("ch1.md"),
            "# One\n<Note id=\"a\">alpha /// ref</Note>\ntext\n<Note id=\"b\">\nbeta\n</Note>",
        )
        .unwrap();

        let notes = store(&dir).list_notes("ch1.md").await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, "a");
        assert_eq!(notes[0].preview, "alpha /// ref");
        assert_eq!(notes[1].preview, "beta");
    }

    #[tokio::test]
    async fn test_list_notes_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            store(&dir).list_notes("nope.md").await,
            Err(NoteError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_note_across_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ch1.md"), "nothing here").unwrap();
        std::fs::write(
            dir.path().join("ch2.mdx"),
            "<Note id=\"n\">\nBody\n///\nBook, p. 4\n///\nArchive\n</Note>",
        )
        .unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "<Note id=\"n\">txt</Note>").unwrap();

        let found = store(&dir).get_note("n").await.unwrap();
        assert_eq!(
            found,
            NoteLookup {
                filename: "ch2.mdx".to_string(),
                content: "Body".to_string(),
                reference: "Book, p. 4\n\nArchive".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_get_note_duplicate_ids_first_listed_wins() {
        let dir = TempDir::new().unwrap();
        write_with_mtime(&dir.path().join("older.md"), "<Note id=\"d\">older</Note>", 1_000);
        write_with_mtime(&dir.path().join("newer.md"), "<Note id=\"d\">newer</Note>", 2_000);

        let found = store(&dir).get_note("d").await.unwrap();
        assert_eq!(found.filename, "newer.md");
        assert_eq!(found.content, "newer");
    }

    #[tokio::test]
    async fn test_get_note_not_found() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ch1.md"), "<Note id=\"a\">a</Note>").unwrap();
        assert!(matches!(
            store(&dir).get_note("zzz").await,
            Err(NoteError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_note_skips_broken_copy_in_newer_file() {
        let dir = TempDir::new().unwrap();
        write_with_mtime(
            &dir.path().join("older.md"),
            "<Note id=\"n\">Real body///Ref</Note>",
            1_000,
        );
        write_with_mtime(&dir.path().join("newer.md"), "<Note id=\"n\">draft never closed", 2_000);
        write_with_mtime(
            &dir.path().join("newest.md"),
            "<Note id=\"n\">a <Note id=\"m\">b</Note></Note>",
            3_000,
        );

        let found = store(&dir).get_note("n").await.unwrap();
        assert_eq!(
            found,
            NoteLookup {
                filename: "older.md".to_string(),
                content: "Real body".to_string(),
                reference: "Ref".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_get_note_only_broken_copies_is_not_found() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ch1.md"), "<Note id=\"n\" never closes").unwrap();
        assert!(matches!(
            store(&dir).get_note("n").await,
            Err(NoteError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_notes_unclosed_note_before_valid_one() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("ch.md"),
            "<Note id=\"a\">typing...\n\nMore prose.\n<Note id=\"b\">fine</Note>",
        )
        .unwrap();

        let notes = store(&dir).list_notes("ch.md").await.unwrap();
        assert_eq!(
            notes,
            vec![NoteSummary {
                id: "b".to_string(),
                preview: "fine".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_update_round_trip_preserves_rest_of_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ch1.md");
        let before = "Chapter text.\n\n";
        let after = "\n\nMore text <Note id=\"y\">why</Note> end.\n";
        std::fs::write(
            &path,
            format!("{}<Note id=\"x\" tone=\"dry\">old /// ref</Note>{}", before, after),
        )
        .unwrap();

        let store = store(&dir);
        store.update_note("x", "ch1.md", "  brand new  ").await.unwrap();

        let found = store.get_note("x").await.unwrap();
        assert_eq!(found.content, "brand new");
        assert_eq!(found.reference, "");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            format!("{}<Note id=\"x\" tone=\"dry\">  brand new  </Note>{}", before, after)
        );
    }

    #[tokio::test]
    async fn test_update_failures_leave_file_unmodified() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ch1.md");
        let original = "<Note id=\"a\">fine</Note>\n<Note id=\"b\">never closed";
        std::fs::write(&path, original).unwrap();
        let store = store(&dir);

        assert!(matches!(
            store.update_note("missing", "ch1.md", "x").await,
            Err(NoteError::NoteNotFound(_))
        ));
        assert!(matches!(
            store.update_note("b", "ch1.md", "x").await,
            Err(NoteError::MissingClosingTag(_))
        ));
        assert!(matches!(
            store.update_note("a", "ch1.md", "").await,
            Err(NoteError::MissingInput("content"))
        ));
        assert!(matches!(
            store.update_note("a", "other.md", "x").await,
            Err(NoteError::FileNotFound(_))
        ));

        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_append_then_list_new_note() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ch1.md"), "End.").unwrap();
        let store = store(&dir);

        store
            .append("ch1.md", "<Note id=\"new\">Fresh idea</Note>")
            .await
            .unwrap();

        let notes = store.list_notes("ch1.md").await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].preview, "Fresh idea");
    }
}

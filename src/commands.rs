//! Tauri IPC commands.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tauri::{AppHandle, Emitter, Manager, State, WebviewWindow, Window};
use tauri_plugin_dialog::DialogExt;

use crate::chapters::{is_chapter_file, ChapterListing};
use crate::error::NoteError;
use crate::notes::NoteSummary;
use crate::store::NoteLookup;
use crate::{styles, AppState};

// Chapter watcher state
#[derive(Default)]
pub struct WatcherState {
    watcher: Mutex<Option<RecommendedWatcher>>,
    debouncer: Arc<Mutex<ChangeDebouncer>>,
}

/// Drops repeated events for the same path within [`ChangeDebouncer::WINDOW`].
#[derive(Default)]
struct ChangeDebouncer {
    last_seen: HashMap<PathBuf, Instant>,
}

impl ChangeDebouncer {
    const WINDOW: Duration = Duration::from_millis(500);
    const PRUNE_AFTER: Duration = Duration::from_secs(5);
    const PRUNE_THRESHOLD: usize = 100;

    fn admit(&mut self, path: &Path, now: Instant) -> bool {
        if self.last_seen.len() > Self::PRUNE_THRESHOLD {
            self.last_seen
                .retain(|_, seen| now.duration_since(*seen) < Self::PRUNE_AFTER);
        }

        let recent = self
            .last_seen
            .get(path)
            .is_some_and(|seen| now.duration_since(*seen) < Self::WINDOW);
        if !recent {
            self.last_seen.insert(path.to_path_buf(), now);
        }
        !recent
    }
}

// Watcher event payload
#[derive(Clone, Serialize)]
struct ChapterChangeEvent {
    kind: &'static str,
    path: String,
}

fn change_kind(kind: &EventKind) -> Option<&'static str> {
    match kind {
        EventKind::Create(_) => Some("created"),
        EventKind::Modify(_) => Some("modified"),
        EventKind::Remove(_) => Some("deleted"),
        _ => None,
    }
}

fn reject(command: &str, e: NoteError) -> String {
    tracing::error!(command, error = %e, "command failed");
    e.to_string()
}

#[tauri::command]
pub async fn get_files(state: State<'_, AppState>) -> Result<ChapterListing, String> {
    state
        .note_store()
        .list_files()
        .await
        .map_err(|e| reject("get_files", e))
}

#[tauri::command]
pub async fn append_content(
    filename: String,
    content: String,
    state: State<'_, AppState>,
) -> Result<String, String> {
    state
        .note_store()
        .append(&filename, &content)
        .await
        .map_err(|e| reject("append_content", e))?;
    Ok(format!("Content appended to {}", filename))
}

#[tauri::command]
pub async fn get_notes(
    filename: String,
    state: State<'_, AppState>,
) -> Result<Vec<NoteSummary>, String> {
    state
        .note_store()
        .list_notes(&filename)
        .await
        .map_err(|e| reject("get_notes", e))
}

#[tauri::command]
pub async fn get_note(note_id: String, state: State<'_, AppState>) -> Result<NoteLookup, String> {
    state
        .note_store()
        .get_note(&note_id)
        .await
        .map_err(|e| reject("get_note", e))
}

#[tauri::command]
pub async fn update_note(
    note_id: String,
    filename: String,
    content: String,
    state: State<'_, AppState>,
) -> Result<String, String> {
    state
        .note_store()
        .update_note(&note_id, &filename, &content)
        .await
        .map_err(|e| reject("update_note", e))?;
    Ok(format!("Note {} updated in {}", note_id, filename))
}

#[tauri::command]
pub fn get_chapters_dir(state: State<AppState>) -> String {
    state.chapters_dir().to_string_lossy().into_owned()
}

/// Ask for a folder and make it the chapters directory. `None` when the picker is cancelled.
#[tauri::command]
pub async fn select_directory(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Option<String>, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog().file().pick_folder(move |folder| {
        let _ = tx.send(folder);
    });

    let Some(folder) = rx.await.map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    let path = folder.into_path().map_err(|e| e.to_string())?;

    let dir = state.select_chapters_dir(&path).map_err(|e| {
        tracing::error!(error = %e, "failed to change chapters directory");
        e.to_string()
    })?;
    Ok(Some(dir.to_string_lossy().into_owned()))
}

#[tauri::command]
pub async fn read_file(filename: String, state: State<'_, AppState>) -> Result<String, String> {
    state
        .note_store()
        .chapters()
        .read(&filename)
        .await
        .map_err(|e| reject("read_file", e))
}

#[tauri::command]
pub async fn write_file(
    filename: String,
    content: String,
    state: State<'_, AppState>,
) -> Result<(), String> {
    state
        .note_store()
        .chapters()
        .write(&filename, &content)
        .await
        .map_err(|e| reject("write_file", e))
}

#[tauri::command]
pub fn join_path(parts: Vec<String>) -> String {
    parts
        .iter()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

#[tauri::command]
pub fn get_stylesheet(app: AppHandle) -> Result<String, String> {
    let config_dir = app.path().app_config_dir().map_err(|e| e.to_string())?;
    Ok(styles::generate_stylesheet(&styles::load_theme(&config_dir)))
}

fn setup_chapter_watcher(
    app: AppHandle,
    chapters_dir: &Path,
    debouncer: Arc<Mutex<ChangeDebouncer>>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            let Some(kind) = change_kind(&event.kind) else {
                return;
            };

            let now = Instant::now();
            for path in event.paths.iter().filter(|p| is_chapter_file(p)) {
                if !debouncer.lock().expect("debouncer mutex").admit(path, now) {
                    continue;
                }
                let payload = ChapterChangeEvent {
                    kind,
                    path: path.to_string_lossy().into_owned(),
                };
                if let Err(e) = app.emit("chapters-changed", payload) {
                    tracing::warn!(error = %e, "failed to emit chapter change");
                }
            }
        },
        Config::default(),
    )?;

    watcher.watch(chapters_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Watch the current chapters directory, replacing any previous watcher.
#[tauri::command]
pub fn start_chapter_watcher(
    app: AppHandle,
    state: State<AppState>,
    watcher_state: State<WatcherState>,
) -> Result<(), String> {
    let chapters_dir = state.chapters_dir();
    let watcher = setup_chapter_watcher(app, &chapters_dir, Arc::clone(&watcher_state.debouncer))
        .map_err(|e| {
            tracing::error!(dir = %chapters_dir.display(), error = %e, "failed to start watcher");
            e.to_string()
        })?;

    *watcher_state.watcher.lock().expect("watcher mutex") = Some(watcher);
    tracing::info!(dir = %chapters_dir.display(), "watching chapters directory");
    Ok(())
}

#[tauri::command]
pub fn close_window(window: Window) -> Result<(), String> {
    window.close().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn minimize_window(window: Window) -> Result<(), String> {
    window.minimize().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn maximize_window(window: Window) -> Result<(), String> {
    if window.is_maximized().map_err(|e| e.to_string())? {
        window.unmaximize().map_err(|e| e.to_string())
    } else {
        window.maximize().map_err(|e| e.to_string())
    }
}

#[tauri::command]
pub fn open_dev_tools(window: WebviewWindow) {
    window.open_devtools();
}

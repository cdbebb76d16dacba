use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub mod chapters;
pub mod config;
pub mod error;
pub mod notes;
pub mod server;
pub mod store;
pub mod styles;

#[cfg(feature = "desktop")]
mod commands;

pub use chapters::{ChapterDir, ChapterFile, ChapterListing};
pub use config::AppConfig;
pub use error::{NoteError, NoteResult};
pub use notes::{NoteParts, NoteSummary};
pub use store::{NoteLookup, NoteStore};

/// Process-wide state shared by both transports.
///
/// The chapters directory is read once per operation; a change made through
/// [`AppState::select_chapters_dir`] is seen by every operation started afterwards.
pub struct AppState {
    config: RwLock<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn chapters_dir(&self) -> PathBuf {
        self.config
            .read()
            .expect("config read lock")
            .chapters_dir()
            .to_path_buf()
    }

    pub fn note_store(&self) -> NoteStore {
        NoteStore::new(ChapterDir::new(self.chapters_dir()))
    }

    pub fn select_chapters_dir(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        self.config
            .write()
            .expect("config write lock")
            .set_chapters_dir(dir)
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chapter_notes_lib=info,chapter_server=info,chapter_notes=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    init_tracing();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            app.manage(AppState::new(AppConfig::load()));
            app.manage(commands::WatcherState::default());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_files,
            commands::append_content,
            commands::get_notes,
            commands::get_note,
            commands::update_note,
            commands::get_chapters_dir,
            commands::select_directory,
            commands::read_file,
            commands::write_file,
            commands::join_path,
            commands::get_stylesheet,
            commands::start_chapter_watcher,
            commands::close_window,
            commands::minimize_window,
            commands::maximize_window,
            commands::open_dev_tools,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

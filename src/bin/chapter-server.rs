//! Standalone HTTP server for the chapter notes API.
//!
//! Environment:
//! - `CHAPTER_NOTES_ADDR`: listen address (default `127.0.0.1:3001`)
//! - `CHAPTER_NOTES_ASSET_DIR`: where `styles.css` is generated and `theme.json` is read
//!   (default `./.chapter-notes`)

use std::path::PathBuf;
use std::sync::Arc;

use chapter_notes_lib::server::{self, ServerState, DEFAULT_ADDR};
use chapter_notes_lib::{init_tracing, styles, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let addr = std::env::var("CHAPTER_NOTES_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.into());
    let asset_dir = std::env::var("CHAPTER_NOTES_ASSET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".chapter-notes"));

    // Stylesheet generation failure is fatal
    let theme = styles::load_theme(&asset_dir);
    let stylesheet = styles::write_stylesheet(&asset_dir, &theme).map_err(|e| {
        tracing::error!(error = %e, "failed to generate stylesheet");
        e
    })?;

    let config = AppConfig::load();
    tracing::info!(chapters_dir = %config.chapters_dir().display(), "serving chapters");

    let state = ServerState {
        app: Arc::new(AppState::new(config)),
        stylesheet,
    };
    server::serve(&addr, state).await
}

//! Editor stylesheet generation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const THEME_FILE_NAME: &str = "theme.json";
pub const STYLESHEET_FILE_NAME: &str = "styles.css";

// Theme color customization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColors {
    pub bg: Option<String>,
    pub bg_secondary: Option<String>,
    pub bg_muted: Option<String>,
    pub text: Option<String>,
    pub text_muted: Option<String>,
    pub border: Option<String>,
    pub accent: Option<String>,
    pub note_bg: Option<String>,
}

// Theme settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    pub mode: String, // "light" | "dark" | "system"
    pub custom_light_colors: Option<ThemeColors>,
    pub custom_dark_colors: Option<ThemeColors>,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            mode: "system".to_string(),
            custom_light_colors: None,
            custom_dark_colors: None,
        }
    }
}

struct Palette {
    bg: &'static str,
    bg_secondary: &'static str,
    bg_muted: &'static str,
    text: &'static str,
    text_muted: &'static str,
    border: &'static str,
    accent: &'static str,
    note_bg: &'static str,
}

const LIGHT: Palette = Palette {
    bg: "#ffffff",
    bg_secondary: "#f6f6f4",
    bg_muted: "#ecebe7",
    text: "#1f1f1c",
    text_muted: "#6b6a65",
    border: "#dcdad3",
    accent: "#9a5b13",
    note_bg: "#fdf6e3",
};

const DARK: Palette = Palette {
    bg: "#1b1b1a",
    bg_secondary: "#242422",
    bg_muted: "#2f2f2c",
    text: "#ecebe7",
    text_muted: "#a3a29c",
    border: "#3a3a36",
    accent: "#e0a458",
    note_bg: "#2b2720",
};

const LAYOUT_RULES: &str = r#"
* { box-sizing: border-box; }
body {
  margin: 0;
  font-family: Georgia, "Iowan Old Style", serif;
  background: var(--bg);
  color: var(--text);
}
.app { display: grid; grid-template-columns: 16rem 1fr 20rem; height: 100vh; }
.sidebar { background: var(--bg-secondary); border-right: 1px solid var(--border); overflow-y: auto; }
.sidebar li { padding: 0.4rem 0.8rem; cursor: pointer; list-style: none; }
.sidebar li.active { color: var(--accent); font-weight: 600; }
.editor { display: flex; flex-direction: column; padding: 1rem; gap: 0.75rem; }
.editor textarea {
  flex: 1;
  resize: none;
  padding: 0.75rem;
  font: inherit;
  color: var(--text);
  background: var(--bg);
  border: 1px solid var(--border);
  border-radius: 4px;
}
.notes { background: var(--bg-muted); border-left: 1px solid var(--border); overflow-y: auto; padding: 0.5rem; }
.note { background: var(--note-bg); border: 1px solid var(--border); border-radius: 4px; padding: 0.5rem; margin-bottom: 0.5rem; cursor: pointer; }
.note .preview { color: var(--text-muted); font-size: 0.9em; }
button { background: var(--accent); color: var(--bg); border: 0; border-radius: 4px; padding: 0.4rem 0.9rem; cursor: pointer; }
.status { color: var(--text-muted); font-size: 0.85em; min-height: 1.2em; }
.status.error { color: #c0392b; }
"#;

// Values end up inside a declaration block, so anything that could close it is dropped
fn is_safe_css_value(value: &str) -> bool {
    !value.is_empty() && !value.contains(|c: char| matches!(c, ';' | '{' | '}' | '<'))
}

fn palette_block(base: &Palette, custom: Option<&ThemeColors>) -> String {
    let custom = custom.cloned().unwrap_or_default();
    let pick = |value: Option<String>, default: &'static str| -> String {
        value
            .filter(|v| is_safe_css_value(v))
            .unwrap_or_else(|| default.to_string())
    };

    let vars = [
        ("--bg", pick(custom.bg, base.bg)),
        ("--bg-secondary", pick(custom.bg_secondary, base.bg_secondary)),
        ("--bg-muted", pick(custom.bg_muted, base.bg_muted)),
        ("--text", pick(custom.text, base.text)),
        ("--text-muted", pick(custom.text_muted, base.text_muted)),
        ("--border", pick(custom.border, base.border)),
        ("--accent", pick(custom.accent, base.accent)),
        ("--note-bg", pick(custom.note_bg, base.note_bg)),
    ];

    let mut block = String::new();
    for (name, value) in vars {
        let _ = writeln!(block, "  {}: {};", name, value);
    }
    block
}

/// Build the full stylesheet for `theme`.
pub fn generate_stylesheet(theme: &ThemeSettings) -> String {
    let light = palette_block(&LIGHT, theme.custom_light_colors.as_ref());
    let dark = palette_block(&DARK, theme.custom_dark_colors.as_ref());

    let mut css = String::new();
    match theme.mode.as_str() {
        "light" => {
            let _ = write!(css, ":root {{\n{}}}\n", light);
        }
        "dark" => {
            let _ = write!(css, ":root {{\n{}}}\n", dark);
        }
        _ => {
            let _ = write!(
                css,
                ":root {{\n{}}}\n@media (prefers-color-scheme: dark) {{\n:root {{\n{}}}\n}}\n",
                light, dark
            );
        }
    }
    css.push_str(LAYOUT_RULES);
    css
}

/// Read `theme.json` from `dir`, or the default theme when it is absent or invalid.
pub fn load_theme(dir: &Path) -> ThemeSettings {
    let path = dir.join(THEME_FILE_NAME);
    if !path.exists() {
        return ThemeSettings::default();
    }

    match std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from))
    {
        Ok(theme) => theme,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid theme file");
            ThemeSettings::default()
        }
    }
}

/// Generate the stylesheet into `dir` and return its path.
pub fn write_stylesheet(dir: &Path, theme: &ThemeSettings) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create asset directory '{}'", dir.display()))?;

    let path = dir.join(STYLESHEET_FILE_NAME);
    std::fs::write(&path, generate_stylesheet(theme))
        .with_context(|| format!("Failed to write stylesheet '{}'", path.display()))?;

    tracing::info!(path = %path.display(), "generated stylesheet");
    Ok(path)
}

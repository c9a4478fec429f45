//! Theme command.

use crate::cli::{AppContext, ThemeAction};
use crate::error::Result;
use crate::prefs::{IS_DARK_MODE, ThemeManager};
use serde_json::json;
use std::path::Path;
use tracing::info;

/// Show or change the dark mode preference.
///
/// The preference file is read and written on the blocking pool, like every
/// store call.
///
/// # Errors
///
/// Returns an error if the preference file cannot be read or written.
pub async fn execute(action: ThemeAction, ctx: &AppContext) -> Result<()> {
    let path = ctx.settings.preferences_path.clone();
    let is_dark = tokio::task::spawn_blocking(move || apply(action, &path)).await??;

    ctx.output.emit(&json!({ (IS_DARK_MODE): is_dark }), || {
        (if is_dark { "dark" } else { "light" }).to_string()
    })
}

fn apply(action: ThemeAction, path: &Path) -> Result<bool> {
    let theme = ThemeManager::open(path)?;
    match action {
        ThemeAction::Show => Ok(theme.is_dark_mode()),
        ThemeAction::Dark => set(&theme, true),
        ThemeAction::Light => set(&theme, false),
        ThemeAction::Toggle => set(&theme, !theme.is_dark_mode()),
    }
}

fn set(theme: &ThemeManager, is_dark: bool) -> Result<bool> {
    theme.set_dark_mode(is_dark)?;
    info!(is_dark, "Theme changed");
    Ok(is_dark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn toggle_flips_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");

        assert!(!apply(ThemeAction::Show, &path).unwrap());
        assert!(apply(ThemeAction::Toggle, &path).unwrap());
        assert!(apply(ThemeAction::Show, &path).unwrap());
        assert!(!apply(ThemeAction::Light, &path).unwrap());
        assert!(!ThemeManager::open(&path).unwrap().is_dark_mode());
    }
}

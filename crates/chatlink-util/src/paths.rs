//! Platform directories used by chatlink.

use std::path::PathBuf;

const APP_DIR: &str = "chatlink";

/// Global config directory.
///
/// On Unix `~/.config/chatlink` wins when it exists, otherwise the
/// platform config directory is used.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join(APP_DIR);
            if xdg.exists() {
                return Some(xdg);
            }
        }
    }

    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// Data directory (token storage lives here).
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR))
}

/// Log directory.
///
/// macOS: `~/Library/Logs/chatlink`, Linux: `~/.local/state/chatlink/logs`,
/// elsewhere the local data directory.
pub fn log_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs").join(APP_DIR);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(state) = dirs::state_dir() {
            return state.join(APP_DIR).join("logs");
        }
    }

    if let Some(local) = dirs::data_local_dir() {
        return local.join(APP_DIR).join("logs");
    }

    PathBuf::from(".chatlink/logs")
}

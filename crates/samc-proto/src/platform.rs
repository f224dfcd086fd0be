use std::path::PathBuf;

/// Default mount point of the window host's file tree.
pub const DEFAULT_ACME_MOUNT: &str = "/mnt/acme";

pub fn data_dir() -> PathBuf {
    // XDG layout on every unix, including macOS
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("samc")
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("samc")
}

pub fn log_path() -> PathBuf {
    data_dir().join("samc.log")
}

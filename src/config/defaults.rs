use directories::ProjectDirs;
use std::path::PathBuf;

pub const LRCLIB_BASE_URL: &str = "https://lrclib.net/api";
pub const USER_AGENT: &str = "Harmony Music Player (https://github.com/harmony-music)";
pub const TIMEOUT_SECS: u64 = 10;
pub const DURATION_TOLERANCE_SECS: u32 = 3;

pub fn data_dir() -> PathBuf {
    ProjectDirs::from("dev", "harmony", "harmony")
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("harmony"))
}

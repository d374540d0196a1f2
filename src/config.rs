use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::ffmpeg::DEFAULT_PROBE_TIMEOUT;

pub const DEFAULT_FORMAT: &str = "bestvideo[height<=1080]+bestaudio/best[height<=1080]";

/// Process-wide defaults, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub ytdlp: PathBuf,
    pub probe_timeout: Duration,
    pub format: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let output_dir = lookup("YTGRAB_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_output_dir);
        let ytdlp = lookup("YTGRAB_YTDLP")
            .map(PathBuf::from)
            .or_else(|| which::which("yt-dlp").ok())
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        let probe_timeout = lookup("YTGRAB_PROBE_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT);

        Self {
            output_dir,
            ytdlp,
            probe_timeout,
            format: DEFAULT_FORMAT.to_string(),
        }
    }
}

/// The user's Downloads folder, or `<home>/Downloads`, or the working directory.
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Empty form input means "use the configured default".
pub fn resolve_output_dir(input: &str, fallback: &Path) -> PathBuf {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        fallback.to_path_buf()
    } else {
        PathBuf::from(trimmed)
    }
}

pub fn ensure_output_dir(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

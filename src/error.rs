/// Problems with the form contents, reported before any download starts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter a YouTube URL.")]
    EmptyUrl,
    #[error("Please specify FFmpeg location.")]
    MissingFfmpeg,
    #[error("FFmpeg not found at the specified location ({0}). Please verify the path.")]
    FfmpegNotFound(String),
    #[error("Cannot use output directory {path}: {reason}")]
    OutputDir { path: String, reason: String },
}

/// Failures of the yt-dlp subprocess.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("failed to start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yt-dlp exited with {code}: {detail}")]
    Exit { code: String, detail: String },
}

pub type DownloadResult<T> = Result<T, DownloadError>;

use std::fmt;

/// Severity attached to a plain status line coming out of yt-dlp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// What the download adapter reports. Workers only ever send these values;
/// they never touch UI state.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// A progress tick for the file currently being fetched.
    Progress {
        filename: String,
        downloaded: u64,
        total: Option<u64>,
        /// Bytes per second
        speed: Option<f64>,
        /// Seconds remaining
        eta: Option<u64>,
    },
    Status { message: String, severity: Severity },
    FileFinished { filename: String },
    /// yt-dlp returned without error.
    Succeeded,
    /// Last event of every session.
    Completed(Result<(), String>),
}

/// Tag printed in front of every relayed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Download,
    Merge,
    Convert,
    Cleanup,
    Info,
    Warning,
    Error,
    Finished,
    Success,
}

impl LogCategory {
    pub fn tag(self) -> &'static str {
        match self {
            LogCategory::Download => "DOWNLOAD",
            LogCategory::Merge => "MERGE",
            LogCategory::Convert => "CONVERT",
            LogCategory::Cleanup => "CLEANUP",
            LogCategory::Info => "INFO",
            LogCategory::Warning => "WARNING",
            LogCategory::Error => "ERROR",
            LogCategory::Finished => "FINISHED",
            LogCategory::Success => "SUCCESS",
        }
    }
}

/// A categorised, timestamped line ready for the log panel.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    /// Wall-clock time formatted as `HH:MM:SS`
    pub timestamp: String,
    pub category: LogCategory,
    pub text: String,
    /// Set when the line carries a success marker
    pub marks_success: bool,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.timestamp, self.category.tag(), self.text)
    }
}

/// What the relay posts to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum UiMessage {
    Line(LogLine),
    Finished(Result<(), String>),
}

/// Final verdict of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
}

/// State of the download currently shown in the log panel.
#[derive(Debug, Default)]
pub struct DownloadSession {
    pub in_flight: bool,
    pub succeeded: bool,
    pub log: Vec<String>,
}

impl DownloadSession {
    /// Clears everything from the previous request and marks a new one as running.
    pub fn begin(&mut self) {
        *self = DownloadSession {
            in_flight: true,
            ..DownloadSession::default()
        };
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.log.push(text.into());
    }

    pub fn record(&mut self, line: &LogLine) {
        if line.marks_success {
            self.succeeded = true;
        }
        self.log.push(line.to_string());
    }

    /// The worker result and any success marker seen in the log are both
    /// accepted as success.
    pub fn finish(&mut self, result: Result<(), String>) -> Outcome {
        self.in_flight = false;
        match result {
            Ok(()) => Outcome::Succeeded,
            Err(_) if self.succeeded => Outcome::Succeeded,
            Err(error) => Outcome::Failed(error),
        }
    }
}

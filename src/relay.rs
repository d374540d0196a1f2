//! Turns download events into timestamped log lines for the UI.
//!
//! One worker feeds an unbounded FIFO queue and a single consumer task drains
//! it, so lines reach the UI in production order, each exactly once.

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tracing::{trace, warn};

use crate::model::{DownloadEvent, LogCategory, LogLine, Severity, UiMessage};
use crate::progress::{display_name, format_progress};

pub const SUCCESS_TEXT: &str = "Download and processing completed successfully!";

/// Where the download adapter reports to.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DownloadEvent);
}

/// Hands a message to the UI thread without blocking the caller.
pub trait UiPost: Send + 'static {
    fn post(&self, message: UiMessage);
}

/// Producer side of the relay queue.
#[derive(Clone)]
pub struct RelaySender {
    tx: UnboundedSender<DownloadEvent>,
}

impl EventSink for RelaySender {
    fn emit(&self, event: DownloadEvent) {
        if self.tx.send(event).is_err() {
            warn!("log relay is gone, dropping event");
        }
    }
}

/// Owns the queue and the consumer task. Dropping it stops the consumer.
pub struct Relay {
    tx: UnboundedSender<DownloadEvent>,
    consumer: JoinHandle<()>,
}

impl Relay {
    pub fn spawn(runtime: &Handle, ui: impl UiPost) -> Self {
        let (tx, rx) = unbounded_channel();
        let consumer = runtime.spawn(consume(rx, ui));
        Self { tx, consumer }
    }

    pub fn sink(&self) -> RelaySender {
        RelaySender { tx: self.tx.clone() }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}

async fn consume(mut rx: UnboundedReceiver<DownloadEvent>, ui: impl UiPost) {
    while let Some(event) = rx.recv().await {
        if let Some(message) = relay_message(event, &now()) {
            ui.post(message);
        }
    }
}

fn now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

pub fn is_success_marker(text: &str) -> bool {
    text.contains("[SUCCESS]") || text.to_lowercase().contains("completed successfully")
}

pub fn stamp(category: LogCategory, text: String, timestamp: &str) -> LogLine {
    let marks_success = category == LogCategory::Success || is_success_marker(&text);
    LogLine {
        timestamp: timestamp.to_string(),
        category,
        text,
        marks_success,
    }
}

/// Picks the category for a status line; first match wins.
pub fn categorize_status(message: &str, severity: Severity) -> Option<LogCategory> {
    if message.contains("[download]") {
        Some(LogCategory::Download)
    } else if message.contains("[Merger]") {
        Some(LogCategory::Merge)
    } else if message.contains("[VideoConvertor]") {
        Some(LogCategory::Convert)
    } else if message.contains("Deleting") {
        Some(LogCategory::Cleanup)
    } else {
        match severity {
            Severity::Debug => None,
            Severity::Info => Some(LogCategory::Info),
            Severity::Warning => Some(LogCategory::Warning),
            Severity::Error => Some(LogCategory::Error),
        }
    }
}

pub fn relay_message(event: DownloadEvent, timestamp: &str) -> Option<UiMessage> {
    let (category, text) = match event {
        DownloadEvent::Progress { filename, downloaded, total, speed, eta } => (
            LogCategory::Download,
            format_progress(&filename, downloaded, total, speed, eta)?,
        ),
        DownloadEvent::Status { message, severity } => match categorize_status(&message, severity) {
            Some(category) => (category, message),
            None => {
                trace!(line = %message, "dropping debug line");
                return None;
            }
        },
        DownloadEvent::FileFinished { filename } => (LogCategory::Finished, display_name(&filename)),
        DownloadEvent::Succeeded => (LogCategory::Success, SUCCESS_TEXT.to_string()),
        DownloadEvent::Completed(result) => return Some(UiMessage::Finished(result)),
    };
    Some(UiMessage::Line(stamp(category, text, timestamp)))
}

#[cfg(test)]
mod tests {
    use super::*;

    impl UiPost for UnboundedSender<UiMessage> {
        fn post(&self, message: UiMessage) {
            let _ = self.send(message);
        }
    }

    fn status(message: &str, severity: Severity) -> DownloadEvent {
        DownloadEvent::Status {
            message: message.to_string(),
            severity,
        }
    }

    fn line_of(event: DownloadEvent) -> Option<LogLine> {
        match relay_message(event, "10:11:12") {
            Some(UiMessage::Line(line)) => Some(line),
            _ => None,
        }
    }

    #[test]
    fn categorizes_by_marker_before_severity() {
        let cases = [
            ("[download] Destination: a.mp4", Severity::Debug, LogCategory::Download),
            ("[Merger] Merging formats into \"a.mp4\"", Severity::Debug, LogCategory::Merge),
            ("[VideoConvertor] Not converting", Severity::Debug, LogCategory::Convert),
            ("Deleting original file a.f137.mp4", Severity::Debug, LogCategory::Cleanup),
            ("[download] oops", Severity::Error, LogCategory::Download),
            ("Extracting URL", Severity::Info, LogCategory::Info),
            ("WARNING: slow", Severity::Warning, LogCategory::Warning),
            ("ERROR: gone", Severity::Error, LogCategory::Error),
        ];
        for (message, severity, expected) in cases {
            assert_eq!(categorize_status(message, severity), Some(expected), "{message}");
        }
    }

    #[test]
    fn drops_plain_debug_lines() {
        assert_eq!(line_of(status("[debug] Python 3.12", Severity::Debug)), None);
    }

    #[test]
    fn progress_without_total_emits_nothing() {
        let event = DownloadEvent::Progress {
            filename: "a.mp4".to_string(),
            downloaded: 10,
            total: None,
            speed: None,
            eta: None,
        };
        assert_eq!(relay_message(event, "00:00:00"), None);
    }

    #[test]
    fn progress_with_total_is_a_download_line() {
        let line = line_of(DownloadEvent::Progress {
            filename: "/out/a.mp4".to_string(),
            downloaded: 25,
            total: Some(100),
            speed: None,
            eta: Some(125),
        })
        .expect("line");
        assert_eq!(line.category, LogCategory::Download);
        assert_eq!(
            line.to_string(),
            "[10:11:12] [DOWNLOAD] a.mp4 - 25.0% | Speed: 0.00 MB/s | ETA: 02:05"
        );
    }

    #[test]
    fn finished_and_success_lines() {
        let finished = line_of(DownloadEvent::FileFinished {
            filename: "/out/clip.mp4".to_string(),
        })
        .expect("line");
        assert_eq!(finished.to_string(), "[10:11:12] [FINISHED] clip.mp4");
        assert!(!finished.marks_success);

        let success = line_of(DownloadEvent::Succeeded).expect("line");
        assert_eq!(success.category, LogCategory::Success);
        assert!(success.marks_success);
    }

    #[test]
    fn success_marker_in_text_is_detected() {
        let line = line_of(status("Post-processing Completed Successfully", Severity::Info))
            .expect("line");
        assert!(line.marks_success);
        assert!(is_success_marker("[SUCCESS] whatever"));
        assert!(!is_success_marker("[INFO] still going"));
    }

    #[test]
    fn completion_passes_through() {
        assert_eq!(
            relay_message(DownloadEvent::Completed(Err("bad".to_string())), "00:00:00"),
            Some(UiMessage::Finished(Err("bad".to_string())))
        );
    }

    #[tokio::test]
    async fn delivers_in_order_exactly_once() {
        let (ui_tx, mut ui_rx) = unbounded_channel();
        let relay = Relay::spawn(&Handle::current(), ui_tx);
        let sink = relay.sink();

        let producer = std::thread::spawn(move || {
            for i in 0..200 {
                sink.emit(status(&format!("line {i}"), Severity::Info));
            }
            sink.emit(DownloadEvent::Completed(Ok(())));
        });

        let mut seen = Vec::new();
        loop {
            match ui_rx.recv().await.expect("relay alive") {
                UiMessage::Line(line) => seen.push(line.text),
                UiMessage::Finished(result) => {
                    assert_eq!(result, Ok(()));
                    break;
                }
            }
        }
        producer.join().expect("producer");

        let expected: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        assert_eq!(seen, expected);
        assert!(ui_rx.try_recv().is_err());
    }
}

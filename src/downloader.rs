use std::{ffi::OsString, io, path::PathBuf, process::Stdio};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::Command,
};
use tracing::{debug, error, info};

use crate::error::{DownloadError, DownloadResult};
use crate::model::{DownloadEvent, Severity};
use crate::progress::{parse_progress_from_line, progress_template};
use crate::relay::EventSink;

/// Everything a single download needs from the form.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub ffmpeg: PathBuf,
}

pub fn build_args(request: &DownloadRequest, format: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-f".into(), format.into()];

    args.push("-o".into());
    args.push(request.output_dir.join("%(title)s.%(ext)s").into_os_string());
    args.push("--merge-output-format".into());
    args.push("mp4".into());
    args.push("--recode-video".into());
    args.push("mp4".into());

    args.push("--ffmpeg-location".into());
    args.push(request.ffmpeg.clone().into_os_string());

    args.push("--progress-template".into());
    args.push(progress_template().into());
    args.push("--newline".into());
    args.push("--verbose".into());

    args.push(request.url.clone().into());
    args
}

/// Maps one line of yt-dlp stdout to an event.
pub fn stdout_event(line: &str) -> Option<DownloadEvent> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(event) = parse_progress_from_line(trimmed) {
        return Some(event);
    }
    let severity = if trimmed.starts_with('[') { Severity::Debug } else { Severity::Info };
    Some(DownloadEvent::Status {
        message: trimmed.to_string(),
        severity,
    })
}

/// Maps one line of yt-dlp stderr to an event.
pub fn stderr_event(line: &str) -> Option<DownloadEvent> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    let severity = if trimmed.starts_with("ERROR:") {
        Severity::Error
    } else if trimmed.starts_with("WARNING:") {
        Severity::Warning
    } else {
        Severity::Debug
    };
    Some(DownloadEvent::Status {
        message: trimmed.to_string(),
        severity,
    })
}

/// Reads one line, replacing bytes that are not UTF-8. yt-dlp echoes titles in
/// whatever encoding the console uses, so a bad byte must not end the stream.
pub async fn next_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Runs yt-dlp to completion, forwarding its output to `sink`.
pub async fn spawn_download<S>(
    ytdlp: PathBuf,
    format: String,
    request: DownloadRequest,
    sink: S,
) -> DownloadResult<()>
where
    S: EventSink + Clone + 'static,
{
    let mut child = Command::new(&ytdlp)
        .args(build_args(&request, &format))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(DownloadError::Spawn)?;

    let stderr = child.stderr.take();
    let err_sink = sink.clone();
    let stderr_task = tokio::spawn(async move {
        let mut last_error = None;
        if let Some(stderr) = stderr {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            while let Ok(Some(line)) = next_lossy_line(&mut reader, &mut buf).await {
                if let Some(event) = stderr_event(&line) {
                    if let DownloadEvent::Status { severity: Severity::Error, message } = &event {
                        last_error = Some(message.clone());
                    }
                    err_sink.emit(event);
                }
            }
        }
        last_error
    });

    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        while let Some(line) = next_lossy_line(&mut reader, &mut buf).await? {
            debug!(target: "ytgrab::ytdlp", "{line}");
            if let Some(event) = stdout_event(&line) {
                sink.emit(event);
            }
        }
    }

    let status = child.wait().await?;
    let last_error = stderr_task.await.ok().flatten();
    if status.success() {
        Ok(())
    } else {
        Err(DownloadError::Exit {
            code: status
                .code()
                .map(|c| format!("code {c}"))
                .unwrap_or_else(|| "a signal".to_string()),
            detail: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// Worker body for one session. Always ends with `Completed`.
pub async fn run_session<S>(ytdlp: PathBuf, format: String, request: DownloadRequest, sink: S)
where
    S: EventSink + Clone + 'static,
{
    info!(url = %request.url, dir = %request.output_dir.display(), "download started");
    let result = spawn_download(ytdlp, format, request, sink.clone()).await;
    match &result {
        Ok(()) => {
            info!("download finished");
            sink.emit(DownloadEvent::Succeeded);
        }
        Err(e) => {
            error!(error = %e, "download failed");
            sink.emit(DownloadEvent::Status {
                message: format!("Download failed: {e}"),
                severity: Severity::Error,
            });
        }
    }
    sink.emit(DownloadEvent::Completed(result.map_err(|e| e.to_string())));
}

use std::path::Path;

use crate::model::DownloadEvent;

/// Prefix yt-dlp is told to print in front of every progress line.
pub const PROGRESS_MARKER: &str = "ytgrab-progress:";

/// Value for `--progress-template`. Filename goes last since it may contain `|`.
pub fn progress_template() -> String {
    format!(
        "download:{PROGRESS_MARKER}%(progress.status)s|%(progress.downloaded_bytes)s|\
         %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|\
         %(progress.eta)s|%(progress.filename)s"
    )
}

/// yt-dlp prints `NA` for missing fields and floats for estimates.
fn number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

pub fn parse_progress_from_line(line: &str) -> Option<DownloadEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = rest.splitn(7, '|');
    let status = fields.next()?.trim();
    let downloaded = fields.next().and_then(number);
    let total = fields.next().and_then(number);
    let estimate = fields.next().and_then(number);
    let speed = fields.next().and_then(number);
    let eta = fields.next().and_then(number);
    let filename = fields
        .next()
        .map(str::trim)
        .filter(|f| !f.is_empty() && *f != "NA")
        .unwrap_or("Unknown file")
        .to_string();

    match status {
        "downloading" => Some(DownloadEvent::Progress {
            filename,
            downloaded: downloaded.unwrap_or(0.0) as u64,
            total: total.or(estimate).map(|t| t as u64),
            speed,
            eta: eta.map(|e| e as u64),
        }),
        "finished" => Some(DownloadEvent::FileFinished { filename }),
        _ => None,
    }
}

/// Percentage of `total` already fetched, or `None` when the total is unknown.
pub fn percentage(downloaded: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|t| *t > 0)?;
    Some((downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

pub fn format_eta(eta: Option<u64>) -> String {
    match eta {
        Some(secs) if secs > 0 => format!("{:02}:{:02}", secs / 60, secs % 60),
        _ => "Unknown".to_string(),
    }
}

/// Last path component, which is all the log panel has room for.
pub fn display_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// Body of a DOWNLOAD line. Nothing is produced while the total is unknown.
pub fn format_progress(
    filename: &str,
    downloaded: u64,
    total: Option<u64>,
    speed: Option<f64>,
    eta: Option<u64>,
) -> Option<String> {
    let pct = percentage(downloaded, total)?;
    let speed_mb = speed.unwrap_or(0.0) / 1024.0 / 1024.0;
    Some(format!(
        "{} - {:.1}% | Speed: {:.2} MB/s | ETA: {}",
        display_name(filename),
        pct,
        speed_mb,
        format_eta(eta)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_downloading_line() {
        let line = "ytgrab-progress:downloading|524288|1048576|NA|2097152.5|65|/tmp/out/Clip.f137.mp4";
        assert_eq!(
            parse_progress_from_line(line),
            Some(DownloadEvent::Progress {
                filename: "/tmp/out/Clip.f137.mp4".to_string(),
                downloaded: 524288,
                total: Some(1048576),
                speed: Some(2097152.5),
                eta: Some(65),
            })
        );
    }

    #[test]
    fn falls_back_to_estimate_when_total_missing() {
        let line = "ytgrab-progress:downloading|10|NA|40.0|NA|NA|a.webm";
        match parse_progress_from_line(line) {
            Some(DownloadEvent::Progress { total, speed, eta, .. }) => {
                assert_eq!(total, Some(40));
                assert_eq!(speed, None);
                assert_eq!(eta, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_finished_line() {
        let line = "ytgrab-progress:finished|100|100|NA|NA|NA|dir/My | Video.mp4";
        assert_eq!(
            parse_progress_from_line(line),
            Some(DownloadEvent::FileFinished {
                filename: "dir/My | Video.mp4".to_string()
            })
        );
    }

    #[test]
    fn ignores_other_lines() {
        assert_eq!(parse_progress_from_line("[download] Destination: x.mp4"), None);
        assert_eq!(parse_progress_from_line("ytgrab-progress:error|1|2|3|4|5|f"), None);
    }

    #[test]
    fn percentage_needs_positive_total() {
        assert_eq!(percentage(50, Some(200)), Some(25.0));
        assert_eq!(percentage(50, Some(0)), None);
        assert_eq!(percentage(50, None), None);
        assert_eq!(percentage(300, Some(200)), Some(100.0));
    }

    #[test]
    fn formats_eta() {
        assert_eq!(format_eta(Some(65)), "01:05");
        assert_eq!(format_eta(Some(0)), "Unknown");
        assert_eq!(format_eta(None), "Unknown");
    }

    #[test]
    fn formats_progress_line() {
        let text = format_progress("/x/y/Video.mp4", 512, Some(1024), Some(1048576.0), Some(9));
        assert_eq!(
            text.as_deref(),
            Some("Video.mp4 - 50.0% | Speed: 1.00 MB/s | ETA: 00:09")
        );
        assert_eq!(format_progress("a", 1, None, None, None), None);
    }
}

//! Desktop front-end for downloading a YouTube video with yt-dlp and FFmpeg

// Process-wide defaults (output dir, yt-dlp binary, probe timeout)
mod config;
// yt-dlp subprocess adapter
mod downloader;
// Error enums for form validation and downloads
mod error;
// FFmpeg discovery and validation
mod ffmpeg;
// Events, log lines and session state
mod model;
// Progress template parsing and formatting
mod progress;
// Queue + consumer that feeds the log panel
mod relay;

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, Sender, channel},
};

use config::{AppConfig, ensure_output_dir, resolve_output_dir};
use downloader::{DownloadRequest, run_session};
use eframe::{App, Frame, egui};
use egui::{Color32, RichText, Visuals};
use error::InputError;
use ffmpeg::Locator;
use model::{DownloadSession, Outcome, UiMessage};
use relay::{Relay, UiPost};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const SEPARATOR_WIDTH: usize = 50;

/// Program entry point: sets up logging and the runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ytgrab=info")),
        )
        .init();

    let config = AppConfig::from_env();
    info!(?config, "starting");
    let runtime = Runtime::new()?;

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "YouTube Video Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(cc.egui_ctx.clone(), runtime, config))
        }),
    )?;
    Ok(())
}

/// Posts relay output to the UI thread and wakes the event loop.
struct UiBridge {
    tx: Sender<UiMessage>,
    ctx: egui::Context,
}

impl UiPost for UiBridge {
    fn post(&self, message: UiMessage) {
        if self.tx.send(message).is_ok() {
            self.ctx.request_repaint();
        }
    }
}

/// Results of background FFmpeg probes.
enum FfmpegCheck {
    Located(Option<PathBuf>),
    Validated { path: String, ok: bool },
    /// Final check made when Download is pressed.
    Preflight { request: DownloadRequest, ok: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FfmpegState {
    Searching,
    Checking,
    Ready,
    Missing,
}

impl FfmpegState {
    fn status(self) -> (String, Color32) {
        match self {
            FfmpegState::Searching => ("Searching for FFmpeg...".to_string(), Color32::GRAY),
            FfmpegState::Checking => ("Checking FFmpeg...".to_string(), Color32::GRAY),
            FfmpegState::Ready => ("FFmpeg found and ready to use".to_string(), Color32::GREEN),
            FfmpegState::Missing => (
                "FFmpeg not found. Please locate FFmpeg installation.".to_string(),
                Color32::RED,
            ),
        }
    }
}

/// The FFmpeg location field and what is known about it.
#[derive(Debug)]
struct FfmpegField {
    input: String,
    state: FfmpegState,
    /// Set once the user typed or browsed; the startup search must not
    /// overwrite their choice after that.
    user_edited: bool,
}

impl FfmpegField {
    fn new() -> Self {
        Self {
            input: String::new(),
            state: FfmpegState::Searching,
            user_edited: false,
        }
    }

    fn edited(&mut self) {
        self.user_edited = true;
        self.state = FfmpegState::Checking;
    }

    fn browsed(&mut self, path: String) {
        self.input = path;
        self.edited();
    }

    /// Path to probe, or `None` (and `Missing`) when the field is empty.
    fn begin_check(&mut self) -> Option<String> {
        let path = self.input.trim().to_string();
        if path.is_empty() {
            self.state = FfmpegState::Missing;
            None
        } else {
            self.state = FfmpegState::Checking;
            Some(path)
        }
    }

    fn located(&mut self, found: Option<PathBuf>) {
        if self.user_edited {
            debug!(?found, "ignoring ffmpeg search result, field was edited");
            return;
        }
        match found {
            Some(path) => {
                info!(path = %path.display(), "ffmpeg located");
                self.input = path.display().to_string();
                self.state = FfmpegState::Ready;
            }
            None => {
                warn!("ffmpeg not found");
                self.state = FfmpegState::Missing;
            }
        }
    }

    /// Results for a path the field no longer holds are dropped.
    fn validated(&mut self, path: &str, ok: bool) {
        if path == self.input.trim() {
            self.state = if ok { FfmpegState::Ready } else { FfmpegState::Missing };
        }
    }
}

/// The Download trigger is live only for a validated FFmpeg and an idle session.
fn can_download(state: FfmpegState, busy: bool) -> bool {
    state == FfmpegState::Ready && !busy
}

/// Application state for the GUI
struct DownloaderApp {
    ctx: egui::Context,
    runtime: Runtime,
    config: AppConfig,
    /// Kept alive for the whole process; dropping it stops the consumer
    relay: Relay,
    ui_rx: Receiver<UiMessage>,
    ffmpeg_tx: Sender<FfmpegCheck>,
    ffmpeg_rx: Receiver<FfmpegCheck>,
    url_input: String,
    download_folder: String,
    ffmpeg: FfmpegField,
    /// Download pressed, waiting for the last FFmpeg check
    starting: bool,
    status: (String, Color32),
    session: DownloadSession,
}

impl DownloaderApp {
    fn new(ctx: egui::Context, runtime: Runtime, config: AppConfig) -> Self {
        let (ui_tx, ui_rx) = channel();
        let relay = Relay::spawn(
            runtime.handle(),
            UiBridge {
                tx: ui_tx,
                ctx: ctx.clone(),
            },
        );
        let (ffmpeg_tx, ffmpeg_rx) = channel();

        let mut app = Self {
            ctx,
            download_folder: config.output_dir.display().to_string(),
            runtime,
            config,
            relay,
            ui_rx,
            ffmpeg_tx,
            ffmpeg_rx,
            url_input: String::new(),
            ffmpeg: FfmpegField::new(),
            starting: false,
            status: FfmpegState::Searching.status(),
            session: DownloadSession::default(),
        };
        app.spawn_locate();
        app
    }

    fn busy(&self) -> bool {
        self.session.in_flight || self.starting
    }

    fn spawn_locate(&mut self) {
        let locator = Locator::from_env(self.config.probe_timeout);
        let tx = self.ffmpeg_tx.clone();
        let ctx = self.ctx.clone();
        self.runtime.spawn(async move {
            let found = locator.locate().await;
            let _ = tx.send(FfmpegCheck::Located(found));
            ctx.request_repaint();
        });
    }

    fn spawn_validate(&mut self) {
        if let Some(path) = self.ffmpeg.begin_check() {
            let limit = self.config.probe_timeout;
            let tx = self.ffmpeg_tx.clone();
            let ctx = self.ctx.clone();
            self.runtime.spawn(async move {
                let ok = ffmpeg::validate(Path::new(&path), limit).await;
                let _ = tx.send(FfmpegCheck::Validated { path, ok });
                ctx.request_repaint();
            });
        }
        self.refresh_status();
    }

    /// Shows the FFmpeg state unless a download owns the status line.
    fn refresh_status(&mut self) {
        if !self.busy() {
            self.status = self.ffmpeg.state.status();
        }
    }

    fn poll_ffmpeg(&mut self) {
        while let Ok(check) = self.ffmpeg_rx.try_recv() {
            match check {
                FfmpegCheck::Located(found) => self.ffmpeg.located(found),
                FfmpegCheck::Validated { path, ok } => self.ffmpeg.validated(&path, ok),
                FfmpegCheck::Preflight { request, ok } => {
                    self.starting = false;
                    if ok {
                        self.launch(request);
                        continue;
                    }
                    let e = InputError::FfmpegNotFound(request.ffmpeg.display().to_string());
                    warn!(error = %e, "download not started");
                    self.ffmpeg.validated(&request.ffmpeg.display().to_string(), false);
                    self.status = self.ffmpeg.state.status();
                    show_error(&e);
                }
            }
            self.refresh_status();
        }
    }

    fn poll_relay(&mut self) {
        while let Ok(message) = self.ui_rx.try_recv() {
            match message {
                UiMessage::Line(line) => self.session.record(&line),
                UiMessage::Finished(result) => self.on_download_complete(result),
            }
        }
    }

    fn on_download_complete(&mut self, result: Result<(), String>) {
        let outcome = self.session.finish(result);
        self.session.push_text("=".repeat(SEPARATOR_WIDTH));
        match outcome {
            Outcome::Succeeded => {
                info!("session succeeded");
                self.status = ("Download completed successfully!".to_string(), Color32::GREEN);
                self.session.push_text("DOWNLOAD COMPLETED SUCCESSFULLY!");
                self.session
                    .push_text("Check your output directory for the downloaded file.");
            }
            Outcome::Failed(error) => {
                warn!(%error, "session failed");
                self.status = (format!("Error: {error}"), Color32::RED);
                self.session.push_text(format!("DOWNLOAD FAILED: {error}"));
            }
        }
    }

    fn prepare_request(&self) -> Result<DownloadRequest, InputError> {
        let (url, ffmpeg) = validate_form(&self.url_input, &self.ffmpeg.input)?;
        let output_dir = resolve_output_dir(&self.download_folder, &self.config.output_dir);
        ensure_output_dir(&output_dir).map_err(|e| InputError::OutputDir {
            path: output_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(DownloadRequest {
            url,
            output_dir,
            ffmpeg,
        })
    }

    /// Checks the form, then re-probes FFmpeg off the UI thread since the
    /// binary may have gone away since the last check.
    fn start_download(&mut self) {
        let request = match self.prepare_request() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "download not started");
                show_error(&e);
                return;
            }
        };

        self.starting = true;
        self.status = ("Checking FFmpeg...".to_string(), Color32::GRAY);
        let limit = self.config.probe_timeout;
        let tx = self.ffmpeg_tx.clone();
        let ctx = self.ctx.clone();
        self.runtime.spawn(async move {
            let ok = ffmpeg::validate(&request.ffmpeg, limit).await;
            let _ = tx.send(FfmpegCheck::Preflight { request, ok });
            ctx.request_repaint();
        });
    }

    fn launch(&mut self, request: DownloadRequest) {
        self.session.begin();
        self.status = ("Downloading...".to_string(), Color32::LIGHT_GRAY);
        self.session.push_text(format!("Starting download for: {}", request.url));
        self.session
            .push_text(format!("Output directory: {}", request.output_dir.display()));
        self.session
            .push_text(format!("FFmpeg path: {}", request.ffmpeg.display()));
        self.session.push_text("-".repeat(SEPARATOR_WIDTH));

        self.runtime.spawn(run_session(
            self.config.ytdlp.clone(),
            self.config.format.clone(),
            request,
            self.relay.sink(),
        ));
    }

    fn browse_directory(&mut self) {
        if let Some(folder) = FileDialog::new()
            .set_directory(&self.download_folder)
            .pick_folder()
        {
            self.download_folder = folder.display().to_string();
        }
    }

    fn browse_ffmpeg(&mut self) {
        let mut dialog = FileDialog::new();
        if cfg!(target_os = "windows") {
            dialog = dialog.add_filter("Executable files", &["exe"]);
        }
        if let Some(file) = dialog.pick_file() {
            self.ffmpeg.browsed(file.display().to_string());
            self.spawn_validate();
        }
    }
}

/// Checks the form fields that need no I/O, in the order the user sees them.
fn validate_form(url: &str, ffmpeg: &str) -> Result<(String, PathBuf), InputError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(InputError::EmptyUrl);
    }
    let ffmpeg = ffmpeg.trim();
    if ffmpeg.is_empty() {
        return Err(InputError::MissingFfmpeg);
    }
    Ok((url.to_string(), PathBuf::from(ffmpeg)))
}

fn show_error(e: &InputError) {
    let text = e.to_string();
    let _ = MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title("Error")
        .set_description(&text)
        .set_buttons(MessageButtons::Ok)
        .show();
}

/// GUI update loop: drains background results, then redraws the form and log
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll_ffmpeg();
        self.poll_relay();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("YouTube Video Downloader");

            egui::Grid::new("download_form")
                .num_columns(3)
                .spacing([8.0, 6.0])
                .show(ui, |ui| {
                    ui.label("YouTube URL:");
                    ui.add(egui::TextEdit::singleline(&mut self.url_input).desired_width(420.0));
                    ui.end_row();

                    ui.label("Output Directory:");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.download_folder).desired_width(420.0),
                    );
                    if ui.button("Browse").clicked() {
                        self.browse_directory();
                    }
                    ui.end_row();

                    ui.label("FFmpeg Location:");
                    let field = ui.add(
                        egui::TextEdit::singleline(&mut self.ffmpeg.input).desired_width(420.0),
                    );
                    if field.changed() {
                        self.ffmpeg.edited();
                        self.refresh_status();
                    }
                    if field.lost_focus() && self.ffmpeg.state == FfmpegState::Checking {
                        self.spawn_validate();
                    }
                    if ui.button("Browse").clicked() {
                        self.browse_ffmpeg();
                    }
                    ui.end_row();
                });

            let can_download = can_download(self.ffmpeg.state, self.busy());
            let button = egui::Button::new("Download").min_size(egui::vec2(ui.available_width(), 28.0));
            if ui.add_enabled(can_download, button).clicked() {
                self.start_download();
            }

            ui.colored_label(self.status.1, &self.status.0);
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Download Logs:");
                if ui
                    .add_enabled(!self.busy(), egui::Button::new("Clear"))
                    .clicked()
                {
                    self.session = DownloadSession::default();
                }
            });

            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in &self.session.log {
                        ui.label(RichText::new(line).monospace());
                    }
                });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_checked_first() {
        assert_eq!(validate_form("  ", ""), Err(InputError::EmptyUrl));
    }

    #[test]
    fn ffmpeg_path_is_required() {
        assert_eq!(
            validate_form("https://youtu.be/x", " "),
            Err(InputError::MissingFfmpeg)
        );
    }

    #[test]
    fn nothing_found_keeps_download_disabled() {
        let mut field = FfmpegField::new();
        assert!(!can_download(field.state, false));
        field.located(None);
        assert_eq!(field.state, FfmpegState::Missing);
        assert!(!can_download(field.state, false));
        assert!(field.state.status().0.contains("not found"));
        assert_eq!(field.state.status().1, Color32::RED);
    }

    #[test]
    fn located_ffmpeg_enables_download_when_idle() {
        let mut field = FfmpegField::new();
        field.located(Some(PathBuf::from("/usr/bin/ffmpeg")));
        assert_eq!(field.input, "/usr/bin/ffmpeg");
        assert!(can_download(field.state, false));
        assert!(!can_download(field.state, true));
    }

    #[test]
    fn late_search_result_keeps_user_choice() {
        let mut field = FfmpegField::new();
        field.browsed("/opt/ffmpeg/bin/ffmpeg".to_string());
        let path = field.begin_check().expect("path");
        field.validated(&path, true);
        assert!(can_download(field.state, false));

        field.located(Some(PathBuf::from("/usr/bin/ffmpeg")));
        assert_eq!(field.input, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(field.state, FfmpegState::Ready);

        field.located(None);
        assert_eq!(field.state, FfmpegState::Ready);
    }

    #[test]
    fn editing_field_disables_download_until_checked() {
        let mut field = FfmpegField::new();
        field.located(Some(PathBuf::from("/usr/bin/ffmpeg")));
        field.input.push('x');
        field.edited();
        assert_eq!(field.state, FfmpegState::Checking);
        assert_eq!(field.state.status().0, "Checking FFmpeg...");
        assert!(!can_download(field.state, false));
    }

    #[test]
    fn stale_validation_is_ignored() {
        let mut field = FfmpegField::new();
        field.browsed("/a/ffmpeg".to_string());
        field.browsed("/b/ffmpeg".to_string());
        field.validated("/a/ffmpeg", true);
        assert_eq!(field.state, FfmpegState::Checking);
        field.validated("/b/ffmpeg", false);
        assert_eq!(field.state, FfmpegState::Missing);
    }

    #[test]
    fn empty_field_is_missing() {
        let mut field = FfmpegField::new();
        field.browsed("   ".to_string());
        assert_eq!(field.begin_check(), None);
        assert_eq!(field.state, FfmpegState::Missing);
    }

    #[test]
    fn trims_form_values() {
        assert_eq!(
            validate_form(" https://youtu.be/x ", " /usr/bin/ffmpeg "),
            Ok(("https://youtu.be/x".to_string(), PathBuf::from("/usr/bin/ffmpeg")))
        );
    }
}

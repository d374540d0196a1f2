//! Finding a working FFmpeg executable.
//!
//! Candidates are tried in a fixed order and the first one that answers
//! `-version` within the probe timeout wins. Nothing here returns an error:
//! `None` from [`Locator::locate`] is the "not found" signal.

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{process::Command, time::timeout};
use tracing::debug;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variables that may point at an FFmpeg install.
pub const HOME_VARS: [&str; 3] = ["FFMPEG_HOME", "FFMPEG_PATH", "FFMPEG_DIR"];

pub fn executable_name() -> &'static str {
    if cfg!(target_os = "windows") { "ffmpeg.exe" } else { "ffmpeg" }
}

/// Conventional install locations, checked last.
pub fn common_install_dirs() -> Vec<PathBuf> {
    let dirs: &[&str] = if cfg!(target_os = "windows") {
        &[
            "C:/tools/ffmpeg/bin",
            "C:/ffmpeg/bin",
            "C:/Program Files/ffmpeg/bin",
            "C:/Program Files (x86)/ffmpeg/bin",
        ]
    } else if cfg!(target_os = "macos") {
        &["/opt/homebrew/bin", "/usr/local/bin"]
    } else {
        &["/usr/bin", "/usr/local/bin", "/snap/bin"]
    };
    dirs.iter().map(PathBuf::from).collect()
}

/// Runs `<path> -version` and reports whether it exited zero in time.
/// Spawn failures, non-zero exits and timeouts all count as invalid.
pub async fn validate(path: &Path, limit: Duration) -> bool {
    let child = Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            debug!(candidate = %path.display(), error = %e, "ffmpeg probe failed to start");
            return false;
        }
    };

    match timeout(limit, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(candidate = %path.display(), %status, "ffmpeg probe finished");
            status.success()
        }
        Ok(Err(e)) => {
            debug!(candidate = %path.display(), error = %e, "ffmpeg probe failed");
            false
        }
        Err(_) => {
            debug!(candidate = %path.display(), "ffmpeg probe timed out");
            let _ = child.kill().await;
            false
        }
    }
}

/// Search inputs for FFmpeg discovery, snapshotted from the environment so
/// the order of lookups can be exercised without touching the real process.
#[derive(Debug, Clone)]
pub struct Locator {
    /// Value of the PATH-like variable
    pub search_path: Option<OsString>,
    /// Values of the FFmpeg home-style variables, in priority order
    pub home_dirs: Vec<PathBuf>,
    /// Command tried through the shell lookup when nothing explicit matched
    pub bare_command: OsString,
    pub install_dirs: Vec<PathBuf>,
    pub probe_timeout: Duration,
}

impl Locator {
    pub fn from_env(probe_timeout: Duration) -> Self {
        Self {
            search_path: env::var_os("PATH"),
            home_dirs: HOME_VARS
                .iter()
                .filter_map(|name| env::var_os(name))
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
                .collect(),
            bare_command: OsString::from("ffmpeg"),
            install_dirs: common_install_dirs(),
            probe_timeout,
        }
    }

    pub async fn validate(&self, path: &Path) -> bool {
        validate(path, self.probe_timeout).await
    }

    pub async fn locate(&self) -> Option<PathBuf> {
        if let Some(found) = self.from_search_path().await {
            return Some(found);
        }
        if let Some(found) = self.from_home_dirs().await {
            return Some(found);
        }
        if let Some(found) = self.from_bare_command().await {
            return Some(found);
        }
        if let Some(found) = self.from_install_dirs().await {
            return Some(found);
        }
        debug!("no working ffmpeg found");
        None
    }

    async fn first_valid(&self, candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            if candidate.is_file() && self.validate(&candidate).await {
                debug!(path = %candidate.display(), "using ffmpeg");
                return Some(candidate);
            }
        }
        None
    }

    async fn from_search_path(&self) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        let candidates: Vec<PathBuf> = env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(executable_name()))
            .collect();
        self.first_valid(candidates).await
    }

    async fn from_home_dirs(&self) -> Option<PathBuf> {
        let candidates: Vec<PathBuf> = self
            .home_dirs
            .iter()
            .flat_map(|home| {
                [
                    home.clone(),
                    home.join("bin").join(executable_name()),
                    home.join(executable_name()),
                ]
            })
            .collect();
        self.first_valid(candidates).await
    }

    /// The bare command works even when its absolute path cannot be resolved.
    async fn from_bare_command(&self) -> Option<PathBuf> {
        let bare = PathBuf::from(&self.bare_command);
        if !self.validate(&bare).await {
            return None;
        }
        match which::which(&self.bare_command) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                debug!(error = %e, "could not resolve ffmpeg path, using bare command");
                Some(bare)
            }
        }
    }

    async fn from_install_dirs(&self) -> Option<PathBuf> {
        let candidates: Vec<PathBuf> = self
            .install_dirs
            .iter()
            .map(|dir| dir.join(executable_name()))
            .filter(|path| path.exists())
            .collect();
        self.first_valid(candidates).await
    }
}

//! yt-dlp as the platform collaborator: caption download and audio extraction.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::config::YtDlpConfig;
use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::source::{AudioExtractor, AudioHandle, CaptionProvider};
use crate::srt;
use crate::youtube;

const CAPTION_EXTENSIONS: &[&str] = &["srt", "vtt"];

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "opus", "webm", "flac", "ogg"];

// inline cue timestamps and styling in auto-generated captions
static VTT_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

// smaller files are truncated downloads
const MIN_AUDIO_BYTES: u64 = 1000;

const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "this video is not available",
    "has been removed",
    "members-only",
    "confirm your age",
    "incomplete youtube id",
    "is not a valid url",
    "http error 404",
    "there are no subtitles",
    "no subtitles",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "http error 429",
    "too many requests",
    "not a bot",
    "timed out",
    "temporary failure",
    "connection reset",
    "connection refused",
    "network is unreachable",
    "http error 5",
    "unable to download webpage",
    "remote end closed connection",
];

pub struct YtDlp {
    binary: PathBuf,
    caption_timeout: Duration,
    audio_timeout: Duration,
    auto_captions: bool,
}

impl YtDlp {
    pub fn new(conf: &YtDlpConfig) -> Self {
        Self {
            binary: conf.binary.clone(),
            caption_timeout: Duration::from_secs(conf.caption_timeout_secs),
            audio_timeout: Duration::from_secs(conf.audio_timeout_secs),
            auto_captions: conf.auto_captions,
        }
    }

    async fn run(
        &self,
        args: Vec<OsString>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Output> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!("running {:?} {:?}", self.binary, args);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Fatal(format!("{:?} not found, is yt-dlp installed?", self.binary))
            } else {
                Error::Fatal(format!("failed to start {:?}: {}", self.binary, e))
            }
        })?;

        // dropping the wait future kills the child
        tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| Error::Fatal(format!("yt-dlp did not finish: {}", e)))
            }
            () = tokio::time::sleep(timeout) => {
                log::warn!("yt-dlp timed out after {:?}", timeout);
                Err(Error::Transient(format!("yt-dlp timed out after {}s", timeout.as_secs())))
            }
            () = cancel.cancelled() => {
                log::debug!("yt-dlp cancelled");
                Err(Error::Cancelled)
            }
        }
    }
}

#[async_trait]
impl CaptionProvider for YtDlp {
    async fn caption_track(
        &self,
        video_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Segment>> {
        let dir = tempfile::Builder::new()
            .prefix("subgrab-subs")
            .tempdir()
            .map_err(|e| Error::Fatal(format!("cannot create temp dir: {}", e)))?;

        let mut args: Vec<OsString> = vec!["--skip-download".into(), "--no-warnings".into()];
        args.push("--write-subs".into());
        if self.auto_captions {
            args.push("--write-auto-subs".into());
        }
        args.extend(
            [
                "--sub-langs",
                language,
                "--sub-format",
                "srt/vtt/best",
                "--convert-subs",
                "srt",
                "-o",
            ]
            .map(OsString::from),
        );
        args.push(dir.path().join("%(id)s.%(ext)s").into_os_string());
        args.push(youtube::watch_url(video_id).into());

        let output = self.run(args, self.caption_timeout, cancel).await?;
        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        read_captions(dir.path(), video_id, language).await
    }
}

/// Reads the caption file yt-dlp left in `dir`. `--convert-subs` needs ffmpeg,
/// so an unconverted `.vtt` is accepted when no `.srt` exists.
async fn read_captions(dir: &Path, video_id: &str, language: &str) -> Result<Vec<Segment>> {
    let Some(path) = find_file(dir, video_id, CAPTION_EXTENSIONS).await? else {
        return Err(Error::NotAvailable(format!(
            "no {} captions for {}",
            language, video_id
        )));
    };

    log::debug!("reading captions from {:?}", path);
    let mut content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| Error::Fatal(format!("cannot read {:?}: {}", path, e)))?;
    if path.extension().is_some_and(|e| e == "vtt") {
        log::warn!("captions were not converted to srt, is ffmpeg installed?");
        content = VTT_MARKUP.replace_all(&content, "").into_owned();
    }

    srt::parse(&content)
        .map_err(|e| Error::Fatal(format!("malformed {} captions for {}: {}", language, video_id, e)))
}

#[async_trait]
impl AudioExtractor for YtDlp {
    async fn extract_audio(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AudioHandle> {
        let dir = tempfile::Builder::new()
            .prefix("subgrab-audio")
            .tempdir()
            .map_err(|e| Error::Fatal(format!("cannot create temp dir: {}", e)))?;

        let mut args: Vec<OsString> = [
            "-f",
            "bestaudio/best",
            "--no-playlist",
            "--no-warnings",
            "--quiet",
            "--extract-audio",
            "--audio-format",
            "wav",
            "-o",
        ]
        .map(OsString::from)
        .into();
        args.push(dir.path().join("%(id)s.%(ext)s").into_os_string());
        args.push(youtube::watch_url(video_id).into());

        let output = self.run(args, self.audio_timeout, cancel).await?;
        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        let Some(path) = find_file(dir.path(), video_id, AUDIO_EXTENSIONS).await? else {
            return Err(Error::NotAvailable(format!(
                "yt-dlp produced no audio for {}",
                video_id
            )));
        };

        let size = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size < MIN_AUDIO_BYTES {
            return Err(Error::NotAvailable(format!(
                "audio for {} is too small ({} bytes), likely corrupt",
                video_id, size
            )));
        }

        log::info!("extracted audio to {:?}", path);
        Ok(AudioHandle::owned(path, dir))
    }
}

/// File in `dir` named after the video, picking the earliest of `extensions`
/// that matches.
async fn find_file(dir: &Path, video_id: &str, extensions: &[&str]) -> Result<Option<PathBuf>> {
    let listing_failed = |e: std::io::Error| Error::Fatal(format!("cannot list {:?}: {}", dir, e));
    let mut entries = tokio::fs::read_dir(dir).await.map_err(listing_failed)?;

    let mut matches: Vec<(usize, PathBuf)> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(listing_failed)? {
        let path = entry.path();
        let named = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(video_id));
        let rank = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| extensions.iter().position(|x| *x == e));
        if let (true, Some(rank)) = (named, rank) {
            matches.push((rank, path));
        }
    }
    matches.sort();

    Ok(matches.into_iter().next().map(|(_, path)| path))
}

/// Maps a failed yt-dlp run to the error taxonomy from its stderr.
pub fn classify_failure(stderr: &str) -> Error {
    let lower = stderr.to_lowercase();
    let summary = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp failed without output")
        .trim()
        .to_string();

    if UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        Error::NotAvailable(summary)
    } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        Error::Transient(summary)
    } else {
        Error::Fatal(summary)
    }
}

//! Caption sources and the collaborators they are built on.
//!
//! A [`CaptionSource`] answers "give me a track for this video in this
//! language". Sources report an expected absence as
//! [`Error::NotAvailable`](crate::Error::NotAvailable), which the resolver
//! consumes to move on to the next fallback step; every other error
//! propagates untouched.

pub mod native;
pub mod transcription;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::ModelSize;
use crate::error::Result;
use crate::segment::{Segment, Track};

pub use native::NativeCaptionSource;
pub use transcription::TranscriptionSource;

#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Short label used in logs and exhaustion reports.
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        video_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Track>;
}

/// Platform caption store.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    async fn caption_track(
        &self,
        video_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Segment>>;
}

/// Media downloader able to pull the audio stream of a video.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract_audio(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AudioHandle>;
}

/// Local speech-to-text engine.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn transcribe(
        &self,
        audio: &AudioHandle,
        model: ModelSize,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Segment>>;
}

/// Extracted audio on disk. When the handle owns a temporary directory, the
/// directory and the audio in it are removed on drop.
#[derive(Debug)]
pub struct AudioHandle {
    path: PathBuf,
    _dir: Option<TempDir>,
}

impl AudioHandle {
    pub fn owned(path: PathBuf, dir: TempDir) -> Self {
        Self {
            path,
            _dir: Some(dir),
        }
    }

    /// Audio whose lifetime is managed elsewhere.
    pub fn borrowed(path: PathBuf) -> Self {
        Self { path, _dir: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

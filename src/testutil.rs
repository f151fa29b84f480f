//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::ModelSize;
use crate::error::{Error, Result};
use crate::segment::{Segment, Track};
use crate::source::{AudioExtractor, AudioHandle, CaptionProvider, CaptionSource, SpeechEngine};

enum Response {
    Segments(Vec<Segment>),
    Fail(fn() -> Error),
}

fn respond(responses: &HashMap<String, Response>, language: &str) -> Result<Vec<Segment>> {
    match responses.get(language) {
        Some(Response::Segments(segments)) => Ok(segments.clone()),
        Some(Response::Fail(make)) => Err(make()),
        None => Err(Error::NotAvailable(format!("no {} track", language))),
    }
}

/// Caption store keyed by language. Unknown languages are `NotAvailable`.
#[derive(Default)]
pub struct FakeProvider {
    responses: HashMap<String, Response>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn with_track(mut self, language: &str, segments: Vec<Segment>) -> Self {
        self.responses
            .insert(language.to_string(), Response::Segments(segments));
        self
    }

    pub fn with_error(mut self, language: &str, make: fn() -> Error) -> Self {
        self.responses
            .insert(language.to_string(), Response::Fail(make));
        self
    }

    pub fn requested(&self) -> Arc<Mutex<Vec<String>>> {
        self.requested.clone()
    }
}

#[async_trait]
impl CaptionProvider for FakeProvider {
    async fn caption_track(
        &self,
        _video_id: &str,
        language: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Segment>> {
        self.requested.lock().unwrap().push(language.to_string());
        respond(&self.responses, language)
    }
}

/// Caption source with scripted answers per language.
pub struct FakeSource {
    name: &'static str,
    responses: HashMap<String, Response>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl FakeSource {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            responses: HashMap::new(),
            requested: Arc::default(),
        }
    }

    pub fn with_track(mut self, language: &str, segments: Vec<Segment>) -> Self {
        self.responses
            .insert(language.to_string(), Response::Segments(segments));
        self
    }

    pub fn with_error(mut self, language: &str, make: fn() -> Error) -> Self {
        self.responses
            .insert(language.to_string(), Response::Fail(make));
        self
    }

    pub fn requested(&self) -> Arc<Mutex<Vec<String>>> {
        self.requested.clone()
    }
}

#[async_trait]
impl CaptionSource for FakeSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(
        &self,
        _video_id: &str,
        language: &str,
        _cancel: &CancellationToken,
    ) -> Result<Track> {
        self.requested.lock().unwrap().push(language.to_string());
        respond(&self.responses, language).map(Track::new)
    }
}

pub struct FakeExtractor {
    dir: Mutex<Option<TempDir>>,
    dir_path: PathBuf,
    error: Option<fn() -> Error>,
    calls: Arc<AtomicUsize>,
}

impl FakeExtractor {
    pub fn with_audio() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("audio.wav"), b"RIFF").unwrap();
        Self {
            dir_path: dir.path().to_path_buf(),
            dir: Mutex::new(Some(dir)),
            error: None,
            calls: Arc::default(),
        }
    }

    pub fn failing(make: fn() -> Error) -> Self {
        Self {
            dir: Mutex::new(None),
            dir_path: PathBuf::new(),
            error: Some(make),
            calls: Arc::default(),
        }
    }

    /// Directory holding the audio handed out by this extractor.
    pub fn audio_dir(&self) -> PathBuf {
        self.dir_path.clone()
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl AudioExtractor for FakeExtractor {
    async fn extract_audio(
        &self,
        _video_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<AudioHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = self.error {
            return Err(make());
        }
        let dir = self
            .dir
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Fatal("audio already handed out".into()))?;
        Ok(AudioHandle::owned(dir.path().join("audio.wav"), dir))
    }
}

enum EngineBehaviour {
    Return(Vec<Segment>),
    Fail(fn() -> Error),
    WaitForCancel,
}

pub struct FakeEngine {
    behaviour: EngineBehaviour,
    calls: Arc<AtomicUsize>,
}

impl FakeEngine {
    fn new(behaviour: EngineBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::default(),
        }
    }

    pub fn returning(segments: Vec<Segment>) -> Self {
        Self::new(EngineBehaviour::Return(segments))
    }

    pub fn failing(make: fn() -> Error) -> Self {
        Self::new(EngineBehaviour::Fail(make))
    }

    /// Runs until the token is cancelled.
    pub fn hanging() -> Self {
        Self::new(EngineBehaviour::WaitForCancel)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl SpeechEngine for FakeEngine {
    async fn transcribe(
        &self,
        audio: &AudioHandle,
        _model: ModelSize,
        _language: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Segment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(audio.path().exists(), "audio must outlive transcription");
        match &self.behaviour {
            EngineBehaviour::Return(segments) => Ok(segments.clone()),
            EngineBehaviour::Fail(make) => Err(make()),
            EngineBehaviour::WaitForCancel => {
                cancel.cancelled().await;
                Err(Error::Cancelled)
            }
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ModelSize;
use crate::error::{Error, Result};
use crate::segment::Track;
use crate::source::{AudioExtractor, CaptionSource, SpeechEngine};

/// Subtitles produced by running speech-to-text over the video's audio.
///
/// Only a failed audio extraction is reported as `NotAvailable`; any engine
/// failure other than cancellation is fatal. The extracted audio is released
/// before this returns, whatever the outcome.
pub struct TranscriptionSource {
    audio: Arc<dyn AudioExtractor>,
    engine: Arc<dyn SpeechEngine>,
    model: ModelSize,
}

impl TranscriptionSource {
    pub fn new(
        audio: Arc<dyn AudioExtractor>,
        engine: Arc<dyn SpeechEngine>,
        model: ModelSize,
    ) -> Self {
        Self {
            audio,
            engine,
            model,
        }
    }
}

#[async_trait]
impl CaptionSource for TranscriptionSource {
    fn name(&self) -> &'static str {
        "transcription"
    }

    async fn fetch(
        &self,
        video_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Track> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        log::info!("extracting audio for {}", video_id);
        let audio = match self.audio.extract_audio(video_id, cancel).await {
            Ok(audio) => audio,
            Err(e @ (Error::NotAvailable(_) | Error::Transient(_) | Error::Cancelled)) => {
                return Err(e);
            }
            Err(e) => {
                return Err(Error::NotAvailable(format!(
                    "audio extraction failed for {}: {}",
                    video_id, e
                )));
            }
        };

        log::info!(
            "transcribing {} with the {} model ({:?})",
            video_id,
            self.model,
            audio.path()
        );
        let result = self
            .engine
            .transcribe(&audio, self.model, language, cancel)
            .await;
        drop(audio);

        let segments = match result {
            Ok(segments) => segments,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e @ Error::Fatal(_)) => return Err(e),
            Err(e) => return Err(Error::Fatal(format!("transcription failed: {}", e))),
        };

        let track = Track::new(segments);
        if !track.has_text() {
            return Err(Error::NotAvailable(format!(
                "no speech recognised in {}",
                video_id
            )));
        }

        log::info!("transcribed {} segments", track.len());
        Ok(track)
    }
}

use std::ffi::c_int;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::{ModelSize, TranscriptionConfig, WhisperConfig};
use crate::error::{Error, Result};
use crate::ffmpeg_decoder;
use crate::segment::Segment;
use crate::source::{AudioHandle, SpeechEngine};
use crate::transcribe::centis_to_millis;

const DEFAULT_BEAM_SIZE: u32 = 5;
const DEFAULT_PATIENCE: f32 = 1.0;

/// Local whisper.cpp inference. A context is created per call, so the model
/// is only resident while a transcription runs.
pub struct Whisper {
    conf: TranscriptionConfig,
    progress: Option<ProgressBar>,
}

impl Whisper {
    pub fn new(conf: TranscriptionConfig) -> Self {
        Self {
            conf,
            progress: None,
        }
    }

    /// Reports inference progress (0-100) on `pb`.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }
}

#[async_trait]
impl SpeechEngine for Whisper {
    async fn transcribe(
        &self,
        audio: &AudioHandle,
        model: ModelSize,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Segment>> {
        let model_path = self
            .conf
            .model_path(model)
            .map_err(|e| Error::Fatal(e.to_string()))?;
        if !model_path.is_file() {
            return Err(Error::Fatal(format!(
                "whisper {} model not found at {:?}",
                model, model_path
            )));
        }

        let job = Job {
            model_path,
            audio_path: audio.path().to_path_buf(),
            whisper: self.conf.whisper.clone(),
            language: language.to_string(),
            cancel: cancel.clone(),
            progress: self.progress.clone(),
        };

        tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| Error::Fatal(format!("transcription task failed: {}", e)))?
    }
}

struct Job {
    model_path: PathBuf,
    audio_path: PathBuf,
    whisper: WhisperConfig,
    language: String,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl Job {
    fn run(self) -> Result<Vec<Segment>> {
        let audio = ffmpeg_decoder::read_file(&self.audio_path)?;
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let ctx = load_context(&self.model_path)?;

        // make parameters
        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: self.whisper.beam_size.unwrap_or(DEFAULT_BEAM_SIZE) as c_int,
            patience: self.whisper.patience.unwrap_or(DEFAULT_PATIENCE),
        });

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_token_timestamps(false);
        params.set_temperature(self.whisper.temperature.unwrap_or(0.0));
        params.set_language(Some(self.language.as_str()));
        if let Some(prompt) = self.whisper.initial_prompt.as_ref() {
            params.set_initial_prompt(prompt);
        }

        // polled by whisper.cpp between decoder steps
        let abort = self.cancel.clone();
        params.set_abort_callback_safe(move || abort.is_cancelled());

        if let Some(pb) = self.progress.clone() {
            params.set_progress_callback_safe(move |progress: i32| {
                pb.set_position(progress.clamp(0, 100) as u64);
            });
        }

        let mut state = ctx
            .create_state()
            .map_err(|e| Error::Fatal(format!("cannot create whisper state: {}", e)))?;
        let outcome = state.full(params, &audio);

        if self.cancel.is_cancelled() {
            log::info!("transcription cancelled");
            return Err(Error::Cancelled);
        }
        outcome.map_err(|e| Error::Fatal(format!("whisper inference failed: {}", e)))?;

        let mut segments = Vec::with_capacity(state.full_n_segments().max(0) as usize);
        for segment in state.as_iter() {
            let text = segment
                .to_str_lossy()
                .map_err(|e| Error::Fatal(format!("cannot read segment text: {}", e)))?
                .trim()
                .to_string();
            let start = centis_to_millis(segment.start_timestamp());
            let end = centis_to_millis(segment.end_timestamp());

            segments.push(Segment::from_millis(segments.len(), start, end, text));
        }

        log::debug!("whisper returned {} segments", segments.len());
        Ok(segments)
    }
}

fn load_context(model_path: &Path) -> Result<WhisperContext> {
    let path = model_path
        .to_str()
        .ok_or_else(|| Error::Fatal(format!("model path {:?} is not valid UTF-8", model_path)))?;

    log::info!("loading whisper model {}", path);
    WhisperContext::new_with_params(path, WhisperContextParameters::default())
        .map_err(|e| Error::Fatal(format!("cannot load whisper model {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let whisper = Whisper::new(TranscriptionConfig {
            models_dir: Some(dir.path().to_path_buf()),
            models: HashMap::new(),
            whisper: WhisperConfig::default(),
        });
        let audio = AudioHandle::borrowed(dir.path().join("audio.wav"));

        let err = whisper
            .transcribe(&audio, ModelSize::Tiny, "en", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fatal(ref m) if m.contains("ggml-tiny.bin")), "{err:?}");
    }

    #[tokio::test]
    #[ignore] // needs ffmpeg and SUBGRAB_TEST_MODEL / SUBGRAB_TEST_AUDIO
    async fn test_whisper_transcribe() {
        let (Ok(model), Ok(audio)) = (
            std::env::var("SUBGRAB_TEST_MODEL"),
            std::env::var("SUBGRAB_TEST_AUDIO"),
        ) else {
            eprintln!("Skipping test: SUBGRAB_TEST_MODEL or SUBGRAB_TEST_AUDIO not set");
            return;
        };

        let whisper = Whisper::new(TranscriptionConfig {
            models_dir: None,
            models: HashMap::from([(ModelSize::Tiny, PathBuf::from(model))]),
            whisper: WhisperConfig::default(),
        });
        let audio = AudioHandle::borrowed(PathBuf::from(audio));

        let segments = whisper
            .transcribe(&audio, ModelSize::Tiny, "en", &CancellationToken::new())
            .await
            .unwrap();

        for segment in &segments {
            println!("[{:?} - {:?}] {}", segment.start, segment.end, segment.text);
        }
        assert!(!segments.is_empty(), "Should return at least one segment");
    }

    #[tokio::test]
    #[ignore] // needs ffmpeg and SUBGRAB_TEST_MODEL / SUBGRAB_TEST_AUDIO
    async fn test_whisper_honours_cancellation() {
        let (Ok(model), Ok(audio)) = (
            std::env::var("SUBGRAB_TEST_MODEL"),
            std::env::var("SUBGRAB_TEST_AUDIO"),
        ) else {
            eprintln!("Skipping test: SUBGRAB_TEST_MODEL or SUBGRAB_TEST_AUDIO not set");
            return;
        };

        let whisper = Whisper::new(TranscriptionConfig {
            models_dir: None,
            models: HashMap::from([(ModelSize::Tiny, PathBuf::from(model))]),
            whisper: WhisperConfig::default(),
        });
        let audio = AudioHandle::borrowed(PathBuf::from(audio));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = whisper
            .transcribe(&audio, ModelSize::Tiny, "en", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}

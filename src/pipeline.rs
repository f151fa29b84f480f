use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{self, Artifact, ArtifactKind, OutputLocks};
use crate::resolver::{ResolutionResult, Resolver, SourceUsed};
use crate::source::{AudioExtractor, CaptionSource, SpeechEngine, TranscriptionSource};
use crate::{srt, text, timing, youtube};

#[derive(Debug)]
pub struct PipelineOutput {
    pub video_id: String,
    pub resolution: ResolutionResult,
    pub artifacts: Vec<Artifact>,
}

/// Summary of a finished run for display or JSON output.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub video_id: &'a str,
    pub source_used: SourceUsed,
    pub language_used: &'a str,
    pub segments: usize,
    pub artifacts: &'a [Artifact],
}

impl PipelineOutput {
    pub fn manifest(&self) -> Manifest<'_> {
        Manifest {
            video_id: &self.video_id,
            source_used: self.resolution.source_used,
            language_used: &self.resolution.language_used,
            segments: self.resolution.track.len(),
            artifacts: &self.artifacts,
        }
    }
}

/// Resolve, validate timings, write artifacts.
///
/// One `Pipeline` can serve concurrent runs. Each run gets its own `Config`;
/// the only state shared between runs is the per-output lock table.
pub struct Pipeline {
    native: Arc<dyn CaptionSource>,
    audio: Arc<dyn AudioExtractor>,
    engine: Arc<dyn SpeechEngine>,
    locks: OutputLocks,
}

impl Pipeline {
    pub fn new(
        native: Arc<dyn CaptionSource>,
        audio: Arc<dyn AudioExtractor>,
        engine: Arc<dyn SpeechEngine>,
    ) -> Self {
        Self {
            native,
            audio,
            engine,
            locks: OutputLocks::default(),
        }
    }

    fn resolver(&self, config: &Config) -> Resolver {
        let transcription = config.use_transcription.then(|| {
            Arc::new(TranscriptionSource::new(
                self.audio.clone(),
                self.engine.clone(),
                config.transcription_model,
            )) as Arc<dyn CaptionSource>
        });
        Resolver::new(self.native.clone(), transcription)
    }

    /// Runs one request. `input` is a video id or URL. On error nothing is
    /// written.
    pub async fn run(
        &self,
        input: &str,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        config.validate()?;
        let video_id = youtube::extract_video_id(input)
            .ok_or_else(|| Error::InvalidVideo(input.to_string()))?;
        log::info!("processing video {}", video_id);

        let resolution = self
            .resolver(config)
            .resolve(&video_id, &config.preferred_language, cancel)
            .await?;

        log::info!("validating timings (minimum gap {}ms)", config.minimum_gap_ms);
        let gap = config.minimum_gap();
        let track = timing::validate(resolution.track, gap);
        let resolution = ResolutionResult {
            track,
            ..resolution
        };

        let mut contents = vec![(ArtifactKind::Subtitles, srt::to_string(&resolution.track))];
        if config.download_only {
            log::info!("download only, skipping text export");
        } else if config.save_text {
            contents.push((ArtifactKind::Text, text::to_paragraphs(&resolution.track, gap)));
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let stem = output::output_stem(&video_id, &resolution.language_used);
        let _guard = self.locks.acquire(&stem).await;
        let artifacts = output::write_artifacts(&config.output_dir, &stem, &contents)?;

        Ok(PipelineOutput {
            video_id,
            resolution,
            artifacts,
        })
    }
}

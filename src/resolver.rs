use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::segment::Track;
use crate::source::CaptionSource;

pub const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceUsed {
    Native,
    FallbackLanguage,
    Transcribed,
}

impl std::fmt::Display for SourceUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SourceUsed::Native => "native captions",
            SourceUsed::FallbackLanguage => "fallback-language captions",
            SourceUsed::Transcribed => "local transcription",
        };
        f.write_str(label)
    }
}

/// The track chosen for a request and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub track: Track,
    pub source_used: SourceUsed,
    /// For transcriptions this is the requested language; the engine does not
    /// guarantee the audio was actually in it.
    pub language_used: String,
}

/// Fallback order. Each step runs at most once per resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    TryPreferred,
    TryEnglishFallback,
    TryTranscription,
    Exhausted,
}

impl Step {
    /// Step to take after the current one reported `NotAvailable`.
    pub fn next(self, preferred_language: &str, transcription_enabled: bool) -> Step {
        let after_native = if transcription_enabled {
            Step::TryTranscription
        } else {
            Step::Exhausted
        };

        match self {
            Step::TryPreferred if preferred_language != FALLBACK_LANGUAGE => {
                Step::TryEnglishFallback
            }
            Step::TryPreferred | Step::TryEnglishFallback => after_native,
            Step::TryTranscription | Step::Exhausted => Step::Exhausted,
        }
    }
}

/// Walks the fallback chain: native captions in the preferred language, then
/// native English captions, then local transcription when enabled.
///
/// Only `NotAvailable` advances the chain. Any other error, including a
/// transient one, ends the resolution and is returned as is.
pub struct Resolver {
    native: Arc<dyn CaptionSource>,
    transcription: Option<Arc<dyn CaptionSource>>,
}

impl Resolver {
    pub fn new(
        native: Arc<dyn CaptionSource>,
        transcription: Option<Arc<dyn CaptionSource>>,
    ) -> Self {
        Self {
            native,
            transcription,
        }
    }

    pub async fn resolve(
        &self,
        video_id: &str,
        preferred_language: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult> {
        let transcription_enabled = self.transcription.is_some();
        let mut tried = Vec::new();
        let mut step = Step::TryPreferred;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let (source, language, source_used) = match step {
                Step::TryPreferred => (&self.native, preferred_language, SourceUsed::Native),
                Step::TryEnglishFallback => {
                    (&self.native, FALLBACK_LANGUAGE, SourceUsed::FallbackLanguage)
                }
                Step::TryTranscription => match &self.transcription {
                    Some(source) => (source, preferred_language, SourceUsed::Transcribed),
                    None => {
                        step = Step::Exhausted;
                        continue;
                    }
                },
                Step::Exhausted => {
                    log::warn!("all subtitle sources exhausted for {}", video_id);
                    return Err(Error::NoSubtitlesAvailable {
                        video_id: video_id.to_string(),
                        tried,
                    });
                }
            };

            tried.push(format!("{}:{}", source.name(), language));
            match source.fetch(video_id, language, cancel).await {
                Ok(track) => {
                    log::info!(
                        "resolved {} via {} ({})",
                        video_id,
                        source_used,
                        language
                    );
                    return Ok(ResolutionResult {
                        track,
                        source_used,
                        language_used: language.to_string(),
                    });
                }
                Err(Error::NotAvailable(reason)) => {
                    step = step.next(preferred_language, transcription_enabled);
                    log::info!("{}; next: {:?}", reason, step);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use crate::testutil::FakeSource;

    fn one_line(text: &str) -> Vec<Segment> {
        vec![Segment::from_millis(0, 0, 1000, text)]
    }

    fn resolver(native: FakeSource, transcription: Option<FakeSource>) -> Resolver {
        Resolver::new(
            Arc::new(native),
            transcription.map(|t| Arc::new(t) as Arc<dyn CaptionSource>),
        )
    }

    #[test]
    fn test_step_order() {
        assert_eq!(Step::TryPreferred.next("fr", true), Step::TryEnglishFallback);
        assert_eq!(Step::TryPreferred.next("en", true), Step::TryTranscription);
        assert_eq!(Step::TryPreferred.next("en", false), Step::Exhausted);
        assert_eq!(Step::TryEnglishFallback.next("fr", true), Step::TryTranscription);
        assert_eq!(Step::TryEnglishFallback.next("fr", false), Step::Exhausted);
        assert_eq!(Step::TryTranscription.next("fr", true), Step::Exhausted);
        assert_eq!(Step::Exhausted.next("fr", true), Step::Exhausted);
    }

    #[tokio::test]
    async fn test_preferred_language_wins() {
        let native = FakeSource::new("native").with_track("fr", one_line("bonjour"));
        let transcription = FakeSource::new("transcription").with_track("fr", one_line("x"));
        let transcribed = transcription.requested();

        let result = resolver(native, Some(transcription))
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source_used, SourceUsed::Native);
        assert_eq!(result.language_used, "fr");
        assert_eq!(result.track.segments()[0].text, "bonjour");
        assert!(transcribed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_english_fallback_precedes_transcription() {
        let native = FakeSource::new("native").with_track("en", one_line("hello"));
        let asked = native.requested();
        let transcription = FakeSource::new("transcription").with_track("fr", one_line("x"));
        let transcribed = transcription.requested();

        let result = resolver(native, Some(transcription))
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source_used, SourceUsed::FallbackLanguage);
        assert_eq!(result.language_used, "en");
        assert_eq!(*asked.lock().unwrap(), ["fr", "en"]);
        assert!(transcribed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transcription_is_last_resort() {
        let native = FakeSource::new("native");
        let transcription =
            FakeSource::new("transcription").with_track("fr", one_line("transcrit"));

        let result = resolver(native, Some(transcription))
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source_used, SourceUsed::Transcribed);
        assert_eq!(result.language_used, "fr");
    }

    #[tokio::test]
    async fn test_english_preference_skips_fallback_step() {
        let native = FakeSource::new("native");
        let asked = native.requested();
        let transcription = FakeSource::new("transcription").with_track("en", one_line("hi"));

        let result = resolver(native, Some(transcription))
            .resolve("vid", "en", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source_used, SourceUsed::Transcribed);
        assert_eq!(*asked.lock().unwrap(), ["en"]);
    }

    #[tokio::test]
    async fn test_exhaustion_without_transcription() {
        let native = FakeSource::new("native");

        let err = resolver(native, None)
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::NoSubtitlesAvailable { video_id, tried } => {
                assert_eq!(video_id, "vid");
                assert_eq!(tried, ["native:fr", "native:en"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_after_failed_transcription() {
        let native = FakeSource::new("native");
        let transcription = FakeSource::new("transcription");

        let err = resolver(native, Some(transcription))
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoSubtitlesAvailable { ref tried, .. } if tried.len() == 3));
    }

    #[tokio::test]
    async fn test_transient_error_short_circuits() {
        let native = FakeSource::new("native")
            .with_error("fr", || Error::Transient("HTTP Error 429".into()))
            .with_track("en", one_line("hello"));
        let asked = native.requested();

        let err = resolver(native, None)
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(*asked.lock().unwrap(), ["fr"]);
    }

    #[tokio::test]
    async fn test_transient_error_on_fallback_is_surfaced() {
        let native = FakeSource::new("native")
            .with_error("en", || Error::Transient("connection reset".into()));
        let transcription = FakeSource::new("transcription").with_track("fr", one_line("x"));
        let transcribed = transcription.requested();

        let err = resolver(native, Some(transcription))
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(transcribed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_transcription_error_propagates() {
        let native = FakeSource::new("native");
        let transcription = FakeSource::new("transcription")
            .with_error("fr", || Error::Fatal("model crashed".into()));

        let err = resolver(native, Some(transcription))
            .resolve("vid", "fr", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fatal(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let native = FakeSource::new("native").with_track("fr", one_line("x"));
        let asked = native.requested();

        let err = resolver(native, None)
            .resolve("vid", "fr", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(asked.lock().unwrap().is_empty());
    }
}

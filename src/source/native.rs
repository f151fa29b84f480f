use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::segment::Track;
use crate::source::{CaptionProvider, CaptionSource};

/// Captions already published on the platform.
pub struct NativeCaptionSource {
    provider: Arc<dyn CaptionProvider>,
}

impl NativeCaptionSource {
    pub fn new(provider: Arc<dyn CaptionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CaptionSource for NativeCaptionSource {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn fetch(
        &self,
        video_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Track> {
        log::info!("fetching {} captions for {}", language, video_id);
        let segments = self
            .provider
            .caption_track(video_id, language, cancel)
            .await?;

        let track = Track::new(segments);
        if !track.has_text() {
            return Err(Error::NotAvailable(format!(
                "{} captions for {} are empty",
                language, video_id
            )));
        }

        log::info!("got {} {} caption segments", track.len(), language);
        Ok(track)
    }
}

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Expected absence. Drives the resolver's fallback, never user-fatal on its own.
    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("transient failure: {0} (retry later)")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("no subtitles available for {video_id} (tried: {})", .tried.join(", "))]
    NoSubtitlesAvailable {
        video_id: String,
        tried: Vec<String>,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid video url or id: {0}")]
    InvalidVideo(String),

    #[error("cancelled")]
    Cancelled,

    #[error("failed to write {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    pub fn is_not_available(&self) -> bool {
        matches!(self, Error::NotAvailable(_))
    }
}

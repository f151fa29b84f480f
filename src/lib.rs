//! Subtitle acquisition for online videos.
//!
//! A [`Pipeline`] resolves a subtitle track from the cheapest source that has
//! one (native captions, then English captions, then local transcription),
//! enforces a minimum gap between segments and writes an `.srt` file plus an
//! optional plain-text version.

pub mod config;
pub mod error;
mod ffmpeg_decoder;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod segment;
pub mod source;
pub mod srt;
pub mod text;
pub mod timing;
pub mod transcribe;
pub mod youtube;
pub mod ytdlp;

#[cfg(test)]
mod testutil;

pub use config::{AppConfig, Config, ModelSize};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineOutput};
pub use resolver::{ResolutionResult, SourceUsed};
pub use segment::{Segment, Track};

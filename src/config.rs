use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }

    /// ggml weight file name as published for whisper.cpp
    pub fn file_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "ggml-tiny.bin",
            ModelSize::Base => "ggml-base.bin",
            ModelSize::Small => "ggml-small.bin",
            ModelSize::Medium => "ggml-medium.bin",
            ModelSize::Large => "ggml-large-v3.bin",
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings for one pipeline run. Read-only once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub preferred_language: String,
    pub minimum_gap_ms: i64,
    pub output_dir: PathBuf,
    pub use_transcription: bool,
    pub transcription_model: ModelSize,
    pub save_text: bool,
    pub download_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_language: "en".to_string(),
            minimum_gap_ms: 100,
            output_dir: PathBuf::from("./subtitles"),
            use_transcription: true,
            transcription_model: ModelSize::Base,
            save_text: false,
            download_only: false,
        }
    }
}

/// Upper bound on `minimum_gap_ms`.
pub const MAX_GAP_MS: i64 = 60 * 60 * 1000;

static LANGUAGE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("valid regex"));

impl Config {
    /// Valid only after `validate` succeeds.
    pub fn minimum_gap(&self) -> Duration {
        Duration::from_millis(self.minimum_gap_ms.max(0) as u64)
    }

    /// Rejects settings that would fail late. Creates the output directory and
    /// probes that it is writable.
    pub fn validate(&self) -> Result<()> {
        if self.minimum_gap_ms < 0 {
            return Err(Error::InvalidConfig(format!(
                "minimum gap must not be negative, got {}ms",
                self.minimum_gap_ms
            )));
        }
        if self.minimum_gap_ms > MAX_GAP_MS {
            return Err(Error::InvalidConfig(format!(
                "minimum gap must be at most {}ms, got {}ms",
                MAX_GAP_MS, self.minimum_gap_ms
            )));
        }
        if !LANGUAGE_CODE.is_match(&self.preferred_language) {
            return Err(Error::InvalidConfig(format!(
                "invalid language code {:?}",
                self.preferred_language
            )));
        }
        ensure_writable(&self.output_dir)
    }
}

fn ensure_writable(dir: &Path) -> Result<()> {
    let unwritable = |e: std::io::Error| {
        Error::InvalidConfig(format!("output directory {:?} is not writable: {}", dir, e))
    };

    std::fs::create_dir_all(dir).map_err(unwritable)?;
    tempfile::Builder::new()
        .prefix(".subgrab-probe")
        .tempfile_in(dir)
        .map_err(unwritable)?;
    Ok(())
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: RunDefaults,
    pub transcription: TranscriptionConfig,
    pub ytdlp: YtDlpConfig,
}

/// File-level defaults for `Config`; command line flags override them.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct RunDefaults {
    pub language: Option<String>,
    pub min_gap_ms: Option<i64>,
    pub output_dir: Option<PathBuf>,
    pub use_transcription: Option<bool>,
    pub model: Option<ModelSize>,
    pub save_text: Option<bool>,
}

impl RunDefaults {
    pub fn to_config(&self) -> Config {
        let base = Config::default();
        Config {
            preferred_language: self.language.clone().unwrap_or(base.preferred_language),
            minimum_gap_ms: self.min_gap_ms.unwrap_or(base.minimum_gap_ms),
            output_dir: self.output_dir.clone().unwrap_or(base.output_dir),
            use_transcription: self.use_transcription.unwrap_or(base.use_transcription),
            transcription_model: self.model.unwrap_or(base.transcription_model),
            save_text: self.save_text.unwrap_or(base.save_text),
            download_only: base.download_only,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Directory holding `ggml-<size>.bin` files. Defaults to `~/.subgrab/models`.
    pub models_dir: Option<PathBuf>,
    /// Explicit weight file per model size, takes precedence over `models_dir`.
    pub models: HashMap<ModelSize, PathBuf>,
    pub whisper: WhisperConfig,
}

impl TranscriptionConfig {
    pub fn model_path(&self, size: ModelSize) -> Result<PathBuf> {
        if let Some(path) = self.models.get(&size) {
            return Ok(path.clone());
        }
        let dir = match &self.models_dir {
            Some(dir) => dir.clone(),
            None => config_dir()?.join("models"),
        };
        Ok(dir.join(size.file_name()))
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct WhisperConfig {
    pub beam_size: Option<u32>,
    pub patience: Option<f32>,
    pub initial_prompt: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct YtDlpConfig {
    pub binary: PathBuf,
    pub caption_timeout_secs: u64,
    pub audio_timeout_secs: u64,
    /// Count platform auto-generated captions as native captions.
    pub auto_captions: bool,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            caption_timeout_secs: 30,
            audio_timeout_secs: 240,
            auto_captions: true,
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::InvalidConfig("could not find home directory".to_string()))?;
    Ok(home.join(".subgrab"))
}

/// Loads `~/.subgrab/config.yaml`, falling back to defaults when it is absent.
pub fn load_app_config() -> Result<AppConfig> {
    let config_path = config_dir()?.join("config.yaml");

    if !config_path.exists() {
        log::debug!("no config file at {:?}, using defaults", config_path);
        return Ok(AppConfig::default());
    }

    load_app_config_from(&config_path)
}

pub fn load_app_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidConfig(format!("cannot read {:?}: {}", path, e)))?;
    parse_app_config(&content)
        .map_err(|e| Error::InvalidConfig(format!("cannot parse {:?}: {}", path, e)))
}

fn parse_app_config(content: &str) -> std::result::Result<AppConfig, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(content)
}

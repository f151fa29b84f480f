use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use subgrab::config::{self, AppConfig, Config, ModelSize};
use subgrab::output::{self, Artifact, ArtifactKind};
use subgrab::source::NativeCaptionSource;
use subgrab::transcribe::Whisper;
use subgrab::ytdlp::YtDlp;
use subgrab::{Pipeline, Track, srt, text, timing, youtube};

#[derive(Parser)]
#[command(name = "subgrab")]
#[command(about = "Download or transcribe subtitles for online videos", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.subgrab/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch subtitles for a video, transcribing locally if needed
    Run {
        /// Video URL or id
        url: String,

        /// Preferred subtitle language
        #[arg(short, long)]
        lang: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Minimum gap between subtitles in milliseconds
        #[arg(long, allow_negative_numbers = true)]
        min_gap: Option<i64>,

        /// Whisper model used for local transcription
        #[arg(short, long, value_enum)]
        model: Option<ModelSize>,

        /// Never fall back to local transcription
        #[arg(long)]
        no_transcription: bool,

        /// Also write a plain text version
        #[arg(long)]
        save_text: bool,

        /// Write the subtitle file only
        #[arg(long)]
        download_only: bool,

        /// Skip the connectivity check
        #[arg(long)]
        skip_check: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-apply timing validation to an existing .srt file
    Retime {
        /// Input .srt file
        input: PathBuf,

        /// Minimum gap between subtitles in milliseconds
        #[arg(
            long,
            default_value_t = 100,
            value_parser = clap::value_parser!(u64).range(0..=config::MAX_GAP_MS as u64)
        )]
        min_gap: u64,

        /// Also write a plain text version
        #[arg(long)]
        text: bool,
    },
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,subgrab={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let app_config = match path {
        Some(path) => config::load_app_config_from(path)?,
        None => config::load_app_config()?,
    };
    Ok(app_config)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });
    cancel
}

/// Re-validates an existing .srt and writes `<stem>.retimed.srt` (and `.txt`)
/// next to it.
fn retime(input: &Path, gap: Duration, with_text: bool) -> anyhow::Result<Vec<Artifact>> {
    let content =
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {:?}", input))?;
    let segments = srt::parse(&content).context("Failed to parse subtitles")?;

    let track = timing::validate(Track::new(segments), gap);
    if track.is_empty() {
        anyhow::bail!("No subtitles in {:?}", input);
    }

    let mut contents = vec![(ArtifactKind::Subtitles, srt::to_string(&track))];
    if with_text {
        contents.push((ArtifactKind::Text, text::to_paragraphs(&track, gap)));
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let parent = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok(output::write_artifacts(
        parent,
        &format!("{}.retimed", stem),
        &contents,
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Run {
            url,
            lang,
            output_dir,
            min_gap,
            model,
            no_transcription,
            save_text,
            download_only,
            skip_check,
            json,
        } => {
            let app_config =
                load_config(cli.config.as_deref()).context("Failed to load app config")?;

            let defaults = app_config.defaults.to_config();
            let run_config = Config {
                preferred_language: lang.unwrap_or(defaults.preferred_language),
                minimum_gap_ms: min_gap.unwrap_or(defaults.minimum_gap_ms),
                output_dir: output_dir.unwrap_or(defaults.output_dir),
                use_transcription: defaults.use_transcription && !no_transcription,
                transcription_model: model.unwrap_or(defaults.transcription_model),
                save_text: defaults.save_text || save_text,
                download_only,
            };
            run_config.validate()?;

            if !skip_check {
                youtube::check_access(&reqwest::Client::new())
                    .await
                    .context("YouTube access check failed")?;
            }

            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% ({eta})",
                    )?
                    .progress_chars("#>-"),
            );

            let ytdlp = Arc::new(YtDlp::new(&app_config.ytdlp));
            let whisper = Whisper::new(app_config.transcription.clone()).with_progress(pb.clone());
            let pipeline = Pipeline::new(
                Arc::new(NativeCaptionSource::new(ytdlp.clone())),
                ytdlp,
                Arc::new(whisper),
            );

            let cancel = cancel_on_ctrl_c();
            let result = pipeline.run(&url, &run_config, &cancel).await;
            pb.finish_and_clear();
            let output = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&output.manifest())?);
            } else {
                println!(
                    "Got {} {} subtitles for {} via {}",
                    output.resolution.track.len(),
                    output.resolution.language_used,
                    output.video_id,
                    output.resolution.source_used
                );
                for artifact in &output.artifacts {
                    println!("Saved {:?}", artifact.path);
                }
            }
        }
        Commands::Retime {
            input,
            min_gap,
            text: with_text,
        } => {
            let artifacts = retime(&input, Duration::from_millis(min_gap), with_text)?;
            for artifact in &artifacts {
                println!("Saved {:?}", artifact.path);
            }
        }
    }

    Ok(())
}

use std::path::Path;
use std::process::{Command, Stdio};

use audrey::Reader;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub const SAMPLE_RATE: u32 = 16_000;

fn decode_failed(what: impl std::fmt::Display) -> Error {
    Error::Fatal(format!("audio decode failed: {}", what))
}

// ffmpeg -i input -ar 16000 -ac 1 -c:a pcm_s16le output.wav
fn use_ffmpeg(input_path: &Path) -> Result<NamedTempFile> {
    log::debug!("converting {:?} to 16kHz mono wav", input_path);

    let temp_file = NamedTempFile::with_suffix(".wav").map_err(decode_failed)?;

    let status = Command::new("ffmpeg")
        .arg("-i")
        .arg(input_path)
        .args(["-ar", &SAMPLE_RATE.to_string(), "-ac", "1", "-c:a", "pcm_s16le"])
        .arg(temp_file.path())
        .args(["-hide_banner", "-y", "-loglevel", "error"])
        .stdin(Stdio::null())
        .status()
        .map_err(|e| decode_failed(format!("cannot run ffmpeg: {}", e)))?;

    if status.success() {
        Ok(temp_file)
    } else {
        Err(decode_failed(format!("ffmpeg exited with {}", status)))
    }
}

/// Decodes any ffmpeg-readable file into mono f32 samples at 16kHz, the
/// input whisper expects.
pub fn read_file(audio_file_path: &Path) -> Result<Vec<f32>> {
    let temp_file = use_ffmpeg(audio_file_path)?;

    let mut reader = Reader::new(temp_file.reopen().map_err(decode_failed)?)
        .map_err(decode_failed)?;
    let audio_buf: Vec<i16> = reader
        .samples()
        .collect::<Result<_, _>>()
        .map_err(decode_failed)?;
    if audio_buf.is_empty() {
        return Err(decode_failed("no samples"));
    }

    let mut output = vec![0.0f32; audio_buf.len()];
    whisper_rs::convert_integer_to_float_audio(&audio_buf, &mut output).map_err(decode_failed)?;
    Ok(output)
    // temp_file is deleted when it goes out of scope here
}

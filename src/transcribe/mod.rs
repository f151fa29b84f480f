pub mod whisper_cpp;

pub use whisper_cpp::Whisper;

/// whisper.cpp timestamps are in centiseconds.
pub(crate) fn centis_to_millis(t: i64) -> u64 {
    t.max(0) as u64 * 10
}

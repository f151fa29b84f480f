use std::time::Duration;

use crate::segment::Track;

/// Paragraph break used when no minimum gap is configured.
const DEFAULT_PARAGRAPH_GAP: Duration = Duration::from_secs(2);

/// Silence longer than this between two segments starts a new paragraph.
pub fn paragraph_threshold(min_gap: Duration) -> Duration {
    if min_gap.is_zero() {
        DEFAULT_PARAGRAPH_GAP
    } else {
        min_gap * 3
    }
}

/// Flattens a validated track into plain text. Segment texts are joined with a
/// single space, internal whitespace is collapsed and paragraphs are separated
/// by a blank line.
pub fn to_paragraphs(track: &Track, min_gap: Duration) -> String {
    let threshold = paragraph_threshold(min_gap);
    let mut paragraphs: Vec<Vec<String>> = Vec::new();
    let mut prev_end: Option<Duration> = None;

    for segment in track.segments() {
        let words = segment.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if words.is_empty() {
            continue;
        }

        let new_paragraph = match prev_end {
            None => true,
            Some(end) => segment.start.saturating_sub(end) > threshold,
        };
        if new_paragraph {
            paragraphs.push(Vec::new());
        }
        if let Some(current) = paragraphs.last_mut() {
            current.push(words);
        }
        prev_end = Some(segment.end);
    }

    if paragraphs.is_empty() {
        return String::new();
    }

    let mut text = paragraphs
        .iter()
        .map(|p| p.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n");
    text.push('\n');
    text
}

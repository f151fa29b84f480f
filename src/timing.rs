use std::time::Duration;

use crate::segment::{Segment, Track};

const MIN_DURATION: Duration = Duration::from_millis(1);

/// Enforces the minimum gap between consecutive segments.
///
/// Blank segments are dropped. A segment starting less than `min_gap` after
/// its predecessor ends is moved later, keeping its original duration (at
/// least 1ms), so no non-empty segment is ever lost to gap enforcement.
/// Surviving segments are renumbered from 0.
///
/// The output is a fixed point: validating it again with the same gap
/// changes nothing.
pub fn validate(track: Track, min_gap: Duration) -> Track {
    let mut out: Vec<Segment> = Vec::with_capacity(track.len());

    for mut segment in track.into_segments() {
        if segment.is_blank() {
            log::debug!("dropping blank segment {}", segment.index);
            continue;
        }

        let duration = segment.duration().max(MIN_DURATION);

        if let Some(prev) = out.last() {
            let earliest = prev.end.saturating_add(min_gap);
            if segment.start < earliest {
                log::debug!(
                    "segment {} starts {:?} after previous, shifting to {:?}",
                    segment.index,
                    segment.start.saturating_sub(prev.end),
                    earliest
                );
                segment.start = earliest;
                segment.end = earliest.saturating_add(duration);
            }
        }

        if segment.end <= segment.start {
            segment.end = segment.start.saturating_add(duration);
        }

        out.push(segment);
    }

    let mut track = Track::new(out);
    track.reindex();
    track
}

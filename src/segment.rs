use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl Segment {
    pub fn new(index: usize, start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    pub fn from_millis(index: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self::new(
            index,
            Duration::from_millis(start_ms),
            Duration::from_millis(end_ms),
            text,
        )
    }

    /// Zero when the raw segment has `end <= start`.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Subtitle track for one video in one language, kept ordered by start time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    segments: Vec<Segment>,
}

impl Track {
    /// Sorts by start time. The sort is stable so raw segments sharing a start
    /// keep their source order.
    pub fn new(mut segments: Vec<Segment>) -> Self {
        segments.sort_by_key(|s| s.start);
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when at least one segment carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.segments.iter().any(|s| !s.is_blank())
    }

    pub fn reindex(&mut self) {
        for (i, segment) in self.segments.iter_mut().enumerate() {
            segment.index = i;
        }
    }
}

impl From<Vec<Segment>> for Track {
    fn from(segments: Vec<Segment>) -> Self {
        Track::new(segments)
    }
}

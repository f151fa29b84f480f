use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};

const OEMBED_PROBE: &str =
    "https://www.youtube.com/oembed?url=https://www.youtube.com/watch?v=dQw4w9WgXcQ&format=json";

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{11}$").expect("valid regex"));

static URL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:v=|youtu\.be/|embed/|shorts/|live/|/)([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)")
        .expect("valid regex")
});

/// Accepts a bare 11 character id or any of the usual watch, short-link,
/// embed and shorts URLs.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    URL_ID
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Cheap reachability check against the public oEmbed endpoint.
pub async fn check_access(client: &reqwest::Client) -> Result<()> {
    let response = client
        .get(OEMBED_PROBE)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| Error::Transient(format!("cannot reach YouTube: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Transient(format!(
            "YouTube answered the access check with {}",
            status
        )))
    }
}
